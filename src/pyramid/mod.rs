//! Timeframe pyramid module
//!
//! The backend delivers a nested tree of blocks: each `D1` block contains its
//! `H4` blocks, each `H4` its `H1` blocks and so on down to `M1`. This module
//! holds everything needed to turn that tree into what the dashboard shows:
//!
//! - [`types`] - wire data types (`Block`, `Timeframe`, `BlockTreeSnapshot`)
//! - [`style`] - pyramid presets and the timeframe visibility filter
//! - [`metrics`] - range size, completion progress and strength per block
//! - [`tree`] - the expanded set and the pure render pass
//!
//! # Example
//!
//! ```rust
//! use flowz_dashboard::pyramid::{
//!     render_tree, Block, ExpandedSet, PyramidStyle, Timeframe, TimeframeVisibility,
//! };
//!
//! let blocks = vec![Block::new(Timeframe::H1, 172000)
//!     .with_ohlc(1.1000, 1.1050, 1.1000, 1.1030)
//!     .with_children(vec![Block::new(Timeframe::M15, 172000).with_momentum("up")])];
//!
//! let visibility = TimeframeVisibility::for_style(PyramidStyle::Intraday);
//! let tree = render_tree(&blocks, &visibility, &ExpandedSet::new(), "EUR/USD");
//!
//! assert_eq!(tree.roots[0].range_size.unwrap().to_string(), "50pips");
//! ```

pub mod metrics;
pub mod style;
pub mod tree;
pub mod types;

pub use metrics::{
    progress, range_size, timeframe_strength, timeframe_strengths, Progress, ProgressStatus,
    RangeSize, RangeUnit, StrengthClass, TimeframeStrength,
};
pub use style::{PyramidStyle, TimeframeVisibility};
pub use tree::{displayable, render_tree, ExpandedSet, RenderedNode, RenderedTree};
pub use types::{Block, BlockId, BlockTime, BlockTreeSnapshot, Direction, Timeframe};
