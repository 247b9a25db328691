//! Presentation surfaces
//!
//! The event loop hands a [`RenderFrame`] to every [`RenderSink`] after each
//! state change. A sink draws the frame however it likes: the terminal sink
//! prints text, the shared sink keeps the frame for the HTTP server.

pub mod html;
pub mod sink;
pub mod text;

use serde::{Deserialize, Serialize};

use crate::alerts::Alert;
use crate::dashboard::StatusLine;
use crate::polling::PollingStatus;
use crate::pyramid::{PyramidStyle, RenderedTree, Timeframe, TimeframeStrength};

pub use html::render_html;
pub use sink::{RecordingSink, RenderSink, SharedFrame, TerminalSink};
pub use text::render_text;

/// Everything a surface needs to draw one dashboard state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    pub pair: String,
    pub style: PyramidStyle,
    pub timeframe: Timeframe,
    pub status: StatusLine,
    pub tree: RenderedTree,
    /// One entry per top-level block of the last snapshot
    pub strengths: Vec<TimeframeStrength>,
    pub polling: PollingStatus,
    pub chart_status: String,
    pub latest_price: Option<f64>,
    pub alerts: Vec<Alert>,
}

impl RenderFrame {
    /// Alerts that are still open
    pub fn active_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(|a| !a.is_resolved())
    }
}
