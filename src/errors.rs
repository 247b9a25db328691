//! Dashboard error types

use thiserror::Error;

/// Errors that can occur while fetching, persisting or configuring the dashboard
///
/// None of these are fatal once the event loop is running: network and data
/// errors leave the last rendered tree in place, persistence errors fall back
/// to in-memory defaults.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("Settings persistence error: {0}")]
    Persistence(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unrecognised value: {0}")]
    Parse(String),
}

impl DashboardError {
    /// Whether this error came from a refresh that the next poll will retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DashboardError::Network(_) | DashboardError::MalformedData(_)
        )
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        DashboardError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::MalformedData(err.to_string())
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> Self {
        DashboardError::Persistence(err.to_string())
    }
}

impl From<config::ConfigError> for DashboardError {
    fn from(err: config::ConfigError) -> Self {
        DashboardError::Config(err.to_string())
    }
}

/// Result type for dashboard operations
pub type DashboardResult<T> = std::result::Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DashboardError::Network("timeout".into()).is_transient());
        assert!(DashboardError::MalformedData("no blocks".into()).is_transient());
        assert!(!DashboardError::Persistence("disk full".into()).is_transient());
        assert!(!DashboardError::Config("bad".into()).is_transient());
    }

    #[test]
    fn test_json_error_is_malformed_data() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: DashboardError = err.into();
        assert!(matches!(err, DashboardError::MalformedData(_)));
    }

    #[test]
    fn test_io_error_is_persistence() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: DashboardError = err.into();
        assert_eq!(err, DashboardError::Persistence("denied".into()));
    }
}
