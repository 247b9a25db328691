//! Pyramid style presets and the timeframe visibility filter

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::types::Timeframe;
use crate::errors::DashboardError;

/// Fixed pyramid presets, each showing a contiguous run of the finer timeframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PyramidStyle {
    Scalper,
    Intraday,
    Swing,
    #[default]
    Daily,
}

impl PyramidStyle {
    pub const ALL: [PyramidStyle; 4] = [
        PyramidStyle::Scalper,
        PyramidStyle::Intraday,
        PyramidStyle::Swing,
        PyramidStyle::Daily,
    ];

    /// Timeframes shown by this preset
    pub fn timeframes(&self) -> &'static [Timeframe] {
        match self {
            PyramidStyle::Scalper => &[Timeframe::M15, Timeframe::M5, Timeframe::M1],
            PyramidStyle::Intraday => &[Timeframe::H1, Timeframe::M15, Timeframe::M5, Timeframe::M1],
            PyramidStyle::Swing => &[
                Timeframe::H4,
                Timeframe::H1,
                Timeframe::M15,
                Timeframe::M5,
                Timeframe::M1,
            ],
            PyramidStyle::Daily => &Timeframe::ALL,
        }
    }

    /// Wire name used in query strings and settings
    pub fn as_str(&self) -> &'static str {
        match self {
            PyramidStyle::Scalper => "scalper",
            PyramidStyle::Intraday => "intraday",
            PyramidStyle::Swing => "swing",
            PyramidStyle::Daily => "daily",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PyramidStyle::Scalper => "Scalper",
            PyramidStyle::Intraday => "Intraday",
            PyramidStyle::Swing => "Swing",
            PyramidStyle::Daily => "Daily",
        }
    }
}

impl fmt::Display for PyramidStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PyramidStyle {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PyramidStyle::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DashboardError::Parse(format!("unknown pyramid style '{}'", s)))
    }
}

/// Per-timeframe visibility, indexed by [`Timeframe::index`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeVisibility {
    visible: [bool; 6],
}

impl TimeframeVisibility {
    pub fn all_visible() -> Self {
        Self { visible: [true; 6] }
    }

    pub fn for_style(style: PyramidStyle) -> Self {
        let mut visibility = Self { visible: [false; 6] };
        visibility.apply_style(style);
        visibility
    }

    /// Rewrite all six entries from the preset; timeframes outside it become invisible
    pub fn apply_style(&mut self, style: PyramidStyle) {
        let shown = style.timeframes();
        for tf in Timeframe::ALL {
            self.visible[tf.index()] = shown.contains(&tf);
        }
    }

    pub fn is_visible(&self, tf: Timeframe) -> bool {
        self.visible[tf.index()]
    }

    pub fn set(&mut self, tf: Timeframe, visible: bool) {
        self.visible[tf.index()] = visible;
    }

    pub fn visible_timeframes(&self) -> impl Iterator<Item = Timeframe> + '_ {
        Timeframe::ALL.into_iter().filter(|tf| self.is_visible(*tf))
    }
}

impl Default for TimeframeVisibility {
    fn default() -> Self {
        Self::all_visible()
    }
}
