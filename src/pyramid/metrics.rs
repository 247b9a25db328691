//! Per-block display metrics: range size, completion progress and timeframe strength

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::{Block, BlockTime, Direction, Timeframe};

/// Tickers that switch the range size to raw points (substring match on the symbol)
pub const CRYPTO_TICKERS: [&str; 6] = ["BTC", "ETH", "XRP", "ADA", "DOT", "LTC"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeUnit {
    Pips,
    Points,
}

impl RangeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeUnit::Pips => "pips",
            RangeUnit::Points => "points",
        }
    }
}

/// High-low range of a block in instrument units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSize {
    pub value: i64,
    pub unit: RangeUnit,
}

impl fmt::Display for RangeSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.as_str())
    }
}

/// Range size of a block for the given instrument symbol
///
/// Branch order is JPY, then crypto, then the forex default. The unit choice is
/// a heuristic on the symbol text, not an exchange lookup. Returns `None` unless
/// both high and low are present.
pub fn range_size(block: &Block, symbol: &str) -> Option<RangeSize> {
    let range = block.high? - block.low?;

    let (scale, unit) = if symbol.contains("JPY") {
        (100.0, RangeUnit::Pips)
    } else if CRYPTO_TICKERS.iter().any(|t| symbol.contains(t)) {
        (1.0, RangeUnit::Points)
    } else {
        (10_000.0, RangeUnit::Pips)
    };

    Some(RangeSize {
        value: round_half_up(range * scale),
        unit,
    })
}

/// Round to nearest, ties toward positive infinity
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Partial,
    Complete,
}

/// How many of a block's expected children have finished computing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// `None` while no child has finished
    pub status: Option<ProgressStatus>,
}

/// Completion progress of a block with children
///
/// The total comes from the block's own timeframe (the parent of the children
/// being counted), falling back to the received child count. Only the presence
/// of a momentum summary matters, so neutral children still count as done.
pub fn progress(block: &Block) -> Option<Progress> {
    if block.children.is_empty() {
        return None;
    }

    let total = block
        .tf
        .expected_children()
        .unwrap_or(block.children.len());
    let completed = block.children.iter().filter(|c| c.has_momentum()).count();

    let status = if completed == total {
        Some(ProgressStatus::Complete)
    } else if completed > 0 {
        Some(ProgressStatus::Partial)
    } else {
        None
    };

    (total > 0).then_some(Progress {
        completed,
        total,
        status,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrengthClass {
    Weak,
    Moderate,
    Strong,
}

impl StrengthClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrengthClass::Weak => "weak",
            StrengthClass::Moderate => "moderate",
            StrengthClass::Strong => "strong",
        }
    }
}

/// Strength of one top-level block, in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeStrength {
    pub tf: Timeframe,
    pub time: BlockTime,
    pub dir: Direction,
    pub strength: f64,
}

impl TimeframeStrength {
    pub fn percent(&self) -> i64 {
        round_half_up(self.strength * 100.0)
    }

    pub fn class(&self) -> StrengthClass {
        match self.percent() {
            p if p >= 67 => StrengthClass::Strong,
            p if p <= 33 => StrengthClass::Weak,
            _ => StrengthClass::Moderate,
        }
    }
}

/// Strength read off a block's momentum summary
///
/// Starts at 0.5. A summary containing "Strong" sets 0.8, otherwise one
/// containing "Weak" sets 0.3; direction then shifts it by 0.1. Without a
/// summary the block stays at 0.5 whatever its direction.
pub fn timeframe_strength(block: &Block) -> f64 {
    let Some(summary) = &block.momentum_summary else {
        return 0.5;
    };

    let mut strength: f64 = if summary.contains("Strong") {
        0.8
    } else if summary.contains("Weak") {
        0.3
    } else {
        0.5
    };
    match block.dir {
        Direction::Up => strength += 0.1,
        Direction::Down => strength -= 0.1,
        Direction::Neutral => {}
    }
    strength.clamp(0.0, 1.0)
}

/// One strength entry per top-level block, in snapshot order
pub fn timeframe_strengths(blocks: &[Block]) -> Vec<TimeframeStrength> {
    blocks
        .iter()
        .map(|block| TimeframeStrength {
            tf: block.tf,
            time: block.time.clone(),
            dir: block.dir,
            strength: timeframe_strength(block),
        })
        .collect()
}
