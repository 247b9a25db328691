//! Visible block tree computation
//!
//! Turns the raw block pyramid plus the visibility filter and the expanded set
//! into a tree of [`RenderedNode`]s. This is pure: no rendering surface is
//! touched here, see [`crate::render`] for that.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::metrics::{progress, range_size, Progress, RangeSize};
use super::style::TimeframeVisibility;
use super::types::{Block, BlockId, BlockTime, Direction, Timeframe};

/// Ids of blocks currently shown expanded
///
/// Entries survive refreshes and are never pruned, so ids that disappear from
/// newer data simply stay in the set until collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedSet {
    ids: BTreeSet<BlockId>,
}

impl ExpandedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expand(&mut self, id: BlockId) {
        self.ids.insert(id);
    }

    pub fn collapse(&mut self, id: &BlockId) {
        self.ids.remove(id);
    }

    /// Flip the state of `id`, returning whether it is now expanded
    pub fn toggle(&mut self, id: &BlockId) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.clone());
            true
        }
    }

    pub fn is_expanded(&self, id: &BlockId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockId> {
        self.ids.iter()
    }
}

/// Whether a block takes part in the rendered tree
///
/// A block is displayable when its own timeframe is visible, or when at least
/// one descendant is displayable; an invisible leaf never is.
pub fn displayable(block: &Block, visibility: &TimeframeVisibility) -> bool {
    visibility.is_visible(block.tf)
        || block.children.iter().any(|c| displayable(c, visibility))
}

/// One emitted block with its derived display fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedNode {
    pub id: BlockId,
    pub tf: Timeframe,
    pub time: BlockTime,
    pub dir: Direction,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub range_label: Option<String>,
    pub momentum_summary: Option<String>,
    pub range_size: Option<RangeSize>,
    pub progress: Option<Progress>,
    /// False when the node is only emitted as a container for visible descendants
    pub own_timeframe_visible: bool,
    pub expanded: bool,
    /// Displayable children, in received order, whether expanded or not
    pub children: Vec<RenderedNode>,
}

impl RenderedNode {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Children a surface should actually show
    pub fn shown_children(&self) -> &[RenderedNode] {
        if self.expanded {
            &self.children
        } else {
            &[]
        }
    }

    fn count(&self) -> usize {
        1 + self.children.iter().map(RenderedNode::count).sum::<usize>()
    }

    fn find(&self, id: &BlockId) -> Option<&RenderedNode> {
        if self.id == *id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

/// Result of one render pass over the root blocks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedTree {
    pub roots: Vec<RenderedNode>,
}

impl RenderedTree {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of emitted nodes at every depth
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(RenderedNode::count).sum()
    }

    pub fn find(&self, id: &BlockId) -> Option<&RenderedNode> {
        self.roots.iter().find_map(|n| n.find(id))
    }
}

/// Compute the rendered tree, depth-first and pre-order over `blocks`
///
/// Identical inputs always yield an identical tree.
pub fn render_tree(
    blocks: &[Block],
    visibility: &TimeframeVisibility,
    expanded: &ExpandedSet,
    symbol: &str,
) -> RenderedTree {
    RenderedTree {
        roots: blocks
            .iter()
            .filter_map(|b| render_block(b, visibility, expanded, symbol))
            .collect(),
    }
}

// A node is emitted iff it is displayable, which is the same as: own timeframe
// visible, or some child got emitted. Deciding bottom-up avoids re-walking subtrees.
fn render_block(
    block: &Block,
    visibility: &TimeframeVisibility,
    expanded: &ExpandedSet,
    symbol: &str,
) -> Option<RenderedNode> {
    let children: Vec<RenderedNode> = block
        .children
        .iter()
        .filter_map(|c| render_block(c, visibility, expanded, symbol))
        .collect();

    let own_timeframe_visible = visibility.is_visible(block.tf);
    if !own_timeframe_visible && children.is_empty() {
        return None;
    }

    let id = block.id();
    Some(RenderedNode {
        expanded: expanded.is_expanded(&id),
        id,
        tf: block.tf,
        time: block.time.clone(),
        dir: block.dir,
        open: block.open,
        high: block.high,
        low: block.low,
        close: block.close,
        volume: block.volume,
        range_label: block.range.clone(),
        momentum_summary: block.momentum_summary.clone(),
        range_size: range_size(block, symbol),
        progress: progress(block),
        own_timeframe_visible,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pyramid::metrics::{ProgressStatus, RangeUnit};
    use crate::pyramid::style::PyramidStyle;

    /// D1 -> 2x H4 -> 2x H1 each -> one M15 leaf each
    fn sample_tree() -> Vec<Block> {
        let h4 = |t: i64| {
            Block::new(Timeframe::H4, t)
                .with_ohlc(1.1000, 1.1050, 1.1000, 1.1020)
                .with_momentum("up")
                .with_children(vec![
                    Block::new(Timeframe::H1, t)
                        .with_momentum("flat")
                        .with_children(vec![Block::new(Timeframe::M15, t)]),
                    Block::new(Timeframe::H1, t + 3600)
                        .with_children(vec![Block::new(Timeframe::M15, t + 3600)]),
                ])
        };
        vec![Block::new(Timeframe::D1, 0)
            .with_ohlc(1.0900, 1.1100, 1.0900, 1.1000)
            .with_children(vec![h4(0), h4(14400)])]
    }

    #[test]
    fn test_invisible_leaf_never_displayable() {
        let visibility = TimeframeVisibility::for_style(PyramidStyle::Swing);
        let leaf = Block::new(Timeframe::D1, 0);
        assert!(!displayable(&leaf, &visibility));
    }

    #[test]
    fn test_invisible_container_with_visible_descendant() {
        let visibility = TimeframeVisibility::for_style(PyramidStyle::Scalper);
        let tree = sample_tree();
        // D1, H4 and H1 are all hidden but the M15 leaves keep them alive
        assert!(displayable(&tree[0], &visibility));

        let rendered = render_tree(&tree, &visibility, &ExpandedSet::new(), "EUR/USD");
        let root = &rendered.roots[0];
        assert!(!root.own_timeframe_visible);
        // Container still carries its own derived fields
        assert_eq!(root.range_size.map(|r| r.value), Some(200));
        assert_eq!(rendered.node_count(), 1 + 2 + 4 + 4);
    }

    #[test]
    fn test_hidden_subtrees_are_skipped_entirely() {
        let mut visibility = TimeframeVisibility::all_visible();
        visibility.set(Timeframe::M15, false);
        let rendered = render_tree(&sample_tree(), &visibility, &ExpandedSet::new(), "EUR/USD");

        assert_eq!(rendered.node_count(), 1 + 2 + 4);
        let h1 = rendered.find(&BlockId::from("H1_0")).unwrap();
        assert!(!h1.has_children());
        // Progress still counts received children, not displayed ones
        assert_eq!(h1.progress.map(|p| p.total), Some(4));
    }

    #[test]
    fn test_nothing_displayable() {
        let mut visibility = TimeframeVisibility::all_visible();
        for tf in Timeframe::ALL {
            visibility.set(tf, false);
        }
        let rendered = render_tree(&sample_tree(), &visibility, &ExpandedSet::new(), "EUR/USD");
        assert!(rendered.is_empty());
    }

    #[test]
    fn test_preorder_and_derived_fields() {
        let rendered = render_tree(
            &sample_tree(),
            &TimeframeVisibility::all_visible(),
            &ExpandedSet::new(),
            "EUR/USD",
        );
        let root = &rendered.roots[0];
        let order: Vec<&str> = root.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["H4_0", "H4_14400"]);

        let h4 = &root.children[0];
        assert_eq!(h4.range_size.map(|r| (r.value, r.unit)), Some((50, RangeUnit::Pips)));
        let p = h4.progress.unwrap();
        assert_eq!((p.completed, p.total, p.status), (1, 4, Some(ProgressStatus::Partial)));
    }

    #[test]
    fn test_expanded_state_follows_id_not_position() {
        let mut expanded = ExpandedSet::new();
        expanded.expand(BlockId::from("H1_3600"));

        let visibility = TimeframeVisibility::all_visible();
        let first = render_tree(&sample_tree(), &visibility, &expanded, "EUR/USD");
        assert!(first.find(&BlockId::from("H1_3600")).unwrap().expanded);

        // Newer data moves the block to a different position
        let mut reordered = sample_tree();
        reordered[0].children.reverse();
        reordered[0].children[1].children.reverse();
        let second = render_tree(&reordered, &visibility, &expanded, "EUR/USD");
        assert!(second.find(&BlockId::from("H1_3600")).unwrap().expanded);
        assert!(!second.find(&BlockId::from("H1_0")).unwrap().expanded);
    }

    #[test]
    fn test_stale_expanded_ids_are_harmless() {
        let mut expanded = ExpandedSet::new();
        expanded.expand(BlockId::from("H1_172000"));

        let rendered = render_tree(
            &sample_tree(),
            &TimeframeVisibility::all_visible(),
            &expanded,
            "EUR/USD",
        );
        assert!(rendered.find(&BlockId::from("H1_172000")).is_none());
        assert!(expanded.is_expanded(&BlockId::from("H1_172000")));
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut expanded = ExpandedSet::new();
        expanded.expand(BlockId::from("D1_0"));
        expanded.expand(BlockId::from("H4_14400"));
        let visibility = TimeframeVisibility::for_style(PyramidStyle::Intraday);
        let tree = sample_tree();

        let a = render_tree(&tree, &visibility, &expanded, "USD/JPY");
        let b = render_tree(&tree, &visibility, &expanded, "USD/JPY");
        assert_eq!(a, b);
    }

    #[test]
    fn test_collapsed_node_hides_children() {
        let mut expanded = ExpandedSet::new();
        let visibility = TimeframeVisibility::all_visible();
        let rendered = render_tree(&sample_tree(), &visibility, &expanded, "EUR/USD");
        assert!(rendered.roots[0].shown_children().is_empty());

        assert!(expanded.toggle(&BlockId::from("D1_0")));
        let rendered = render_tree(&sample_tree(), &visibility, &expanded, "EUR/USD");
        assert_eq!(rendered.roots[0].shown_children().len(), 2);

        assert!(!expanded.toggle(&BlockId::from("D1_0")));
        assert!(expanded.is_empty());
    }
}
