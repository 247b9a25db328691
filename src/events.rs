//! User actions delivered to the dashboard event loop

use std::fmt;
use std::str::FromStr;

use crate::errors::DashboardError;
use crate::pyramid::{BlockId, PyramidStyle, Timeframe};

/// Discrete user action
///
/// Only pair and pyramid style changes speed up polling; every other action is
/// handled locally without touching the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    PairChange(String),
    PyramidStyleChange(PyramidStyle),
    TimeframeChange(Timeframe),
    ExpandToggle(BlockId),
    AlertToggle { setting: String, enabled: bool },
    Quit,
    Other(String),
}

impl UserAction {
    /// Tag of the action as reported in logs
    pub fn kind(&self) -> &str {
        match self {
            UserAction::PairChange(_) => "pair_change",
            UserAction::PyramidStyleChange(_) => "pyramid_style_change",
            UserAction::TimeframeChange(_) => "timeframe_change",
            UserAction::ExpandToggle(_) => "expand_toggle",
            UserAction::AlertToggle { .. } => "alert_toggle",
            UserAction::Quit => "quit",
            UserAction::Other(kind) => kind.as_str(),
        }
    }

    /// Whether this action switches the scheduler to fast polling
    pub fn boosts_polling(&self) -> bool {
        matches!(
            self,
            UserAction::PairChange(_) | UserAction::PyramidStyleChange(_)
        )
    }
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserAction::PairChange(pair) => write!(f, "pair {}", pair),
            UserAction::PyramidStyleChange(style) => write!(f, "style {}", style),
            UserAction::TimeframeChange(tf) => write!(f, "timeframe {}", tf),
            UserAction::ExpandToggle(id) => write!(f, "expand {}", id),
            UserAction::AlertToggle { setting, enabled } => {
                write!(f, "alerts {} {}", setting, if *enabled { "on" } else { "off" })
            }
            UserAction::Quit => f.write_str("quit"),
            UserAction::Other(kind) => f.write_str(kind),
        }
    }
}

/// Parse one line of the text action stream
///
/// ```text
/// pair USD/JPY
/// style scalper
/// timeframe M15
/// expand H1_172000
/// alerts rsi_alerts off
/// quit
/// ```
///
/// Unknown verbs become [`UserAction::Other`]; known verbs with bad arguments are errors.
impl FromStr for UserAction {
    type Err = DashboardError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| DashboardError::Parse("empty action".into()))?;
        let arg = parts.next();

        let missing = || DashboardError::Parse(format!("'{}' needs an argument", verb));

        match verb.to_lowercase().as_str() {
            "pair" => {
                let pair = arg.ok_or_else(missing)?;
                Ok(UserAction::PairChange(pair.to_uppercase()))
            }
            "style" => Ok(UserAction::PyramidStyleChange(
                arg.ok_or_else(missing)?.parse()?,
            )),
            "timeframe" | "tf" => Ok(UserAction::TimeframeChange(
                arg.ok_or_else(missing)?.parse()?,
            )),
            "expand" | "collapse" | "toggle" => {
                Ok(UserAction::ExpandToggle(BlockId::from(arg.ok_or_else(missing)?)))
            }
            "alerts" => {
                let setting = arg.ok_or_else(missing)?.to_string();
                let enabled = match parts.next().map(str::to_lowercase).as_deref() {
                    Some("on") | Some("true") => true,
                    Some("off") | Some("false") => false,
                    _ => {
                        return Err(DashboardError::Parse(
                            "alerts toggle needs 'on' or 'off'".into(),
                        ))
                    }
                };
                Ok(UserAction::AlertToggle { setting, enabled })
            }
            "quit" | "exit" => Ok(UserAction::Quit),
            _ => Ok(UserAction::Other(line.trim().to_string())),
        }
    }
}
