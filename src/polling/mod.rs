//! Adaptive polling
//!
//! - [`scheduler`] - the normal/active state machine, free of real timers
//! - [`action`] - the effects each transition asks its host to perform
//! - [`virtual_clock`] - a simulated-time host, used to check cadences
//!
//! The tokio host lives in [`crate::runner`].

pub mod action;
pub mod scheduler;
pub mod virtual_clock;

pub use action::{PollActions, PollEffect};
pub use scheduler::{
    PollingConfig, PollingMode, PollingScheduler, PollingStatus, ACTIVE_INTERVAL, ACTIVE_WINDOW,
    MAX_ACTIVE_TICKS, NORMAL_INTERVAL,
};
pub use virtual_clock::VirtualClock;
