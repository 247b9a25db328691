#![deny(unreachable_pub)]
pub mod alerts;
pub mod chart;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod events;
pub mod feed;
pub mod polling;
pub mod pyramid;
pub mod render;
pub mod runner;
pub mod server;
pub mod store;

pub use dashboard::{DashboardState, StatusLine};
pub use errors::{DashboardError, DashboardResult};
pub use events::UserAction;
pub use feed::{DashboardFeed, HttpDashboardFeed, PyramidQuery};
pub use polling::{PollingConfig, PollingMode, PollingScheduler, PollingStatus};
pub use runner::{DashboardRunner, EventLoop};
