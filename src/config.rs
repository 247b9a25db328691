use std::time::Duration;

use config::{Config, File};
use serde::Deserialize;

use crate::chart::{IndicatorKind, IndicatorSet};
use crate::errors::{DashboardError, DashboardResult};
use crate::polling::PollingConfig;
use crate::pyramid::{PyramidStyle, Timeframe};

/// Main configuration struct
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Backend API location
    pub api: ApiConfig,
    /// Initial pair, style and timeframe
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// Polling cadence
    #[serde(default)]
    pub polling: PollingSettings,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// e.g. "http://127.0.0.1:5000"
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_request_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_pair")]
    pub pair: String,
    /// "scalper", "intraday", "swing" or "daily"
    #[serde(default = "default_pyramid_style")]
    pub pyramid_style: String,
    /// Chart timeframe, "D1" through "M1"
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    /// JSON file holding persisted user settings
    #[serde(default = "default_settings_file")]
    pub settings_file: String,
    /// Indicators requested with every chart fetch
    #[serde(default = "default_indicators")]
    pub indicators: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            pair: default_pair(),
            pyramid_style: default_pyramid_style(),
            timeframe: default_timeframe(),
            settings_file: default_settings_file(),
            indicators: default_indicators(),
        }
    }
}

impl DashboardConfig {
    pub fn style(&self) -> DashboardResult<PyramidStyle> {
        self.pyramid_style
            .parse()
            .map_err(|e: DashboardError| DashboardError::Config(e.to_string()))
    }

    pub fn timeframe(&self) -> DashboardResult<Timeframe> {
        self.timeframe
            .parse()
            .map_err(|e: DashboardError| DashboardError::Config(e.to_string()))
    }

    pub fn indicator_set(&self) -> DashboardResult<IndicatorSet> {
        let mut set = IndicatorSet::new();
        for name in &self.indicators {
            let kind: IndicatorKind = name
                .parse()
                .map_err(|e: DashboardError| DashboardError::Config(e.to_string()))?;
            set.add(kind);
        }
        Ok(set)
    }
}

fn default_pair() -> String {
    "EUR/USD".to_string()
}

fn default_pyramid_style() -> String {
    "daily".to_string()
}

fn default_timeframe() -> String {
    "H1".to_string()
}

fn default_settings_file() -> String {
    "dashboard_settings.json".to_string()
}

fn default_indicators() -> Vec<String> {
    vec!["rsi".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingSettings {
    #[serde(default = "default_active_interval_ms")]
    pub active_interval_ms: u64,
    #[serde(default = "default_normal_interval_ms")]
    pub normal_interval_ms: u64,
    #[serde(default = "default_active_window_ms")]
    pub active_window_ms: u64,
    #[serde(default = "default_max_active_ticks")]
    pub max_active_ticks: u32,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            active_interval_ms: default_active_interval_ms(),
            normal_interval_ms: default_normal_interval_ms(),
            active_window_ms: default_active_window_ms(),
            max_active_ticks: default_max_active_ticks(),
        }
    }
}

fn default_active_interval_ms() -> u64 {
    2_000
}

fn default_normal_interval_ms() -> u64 {
    30_000
}

fn default_active_window_ms() -> u64 {
    10_000
}

fn default_max_active_ticks() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Serve the dashboard over HTTP
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,
    /// Server port (default 3000)
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Server host (default 127.0.0.1)
    #[serde(default = "default_server_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            port: default_server_port(),
            host: default_server_host(),
        }
    }
}

fn default_server_enabled() -> bool {
    false
}

fn default_server_port() -> u16 {
    3000
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

impl Settings {
    /// Load settings from a configuration file
    pub fn new(config_path: &str) -> DashboardResult<Self> {
        let s = Config::builder()
            .add_source(File::with_name(config_path))
            // Environment variables override the file,
            // e.g. FLOWZ_API__BASE_URL=http://10.0.0.2:5000
            .add_source(
                config::Environment::with_prefix("FLOWZ")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(s.try_deserialize()?)
    }

    /// Validated scheduler parameters
    pub fn polling_config(&self) -> DashboardResult<PollingConfig> {
        let config = PollingConfig {
            active_interval: Duration::from_millis(self.polling.active_interval_ms),
            normal_interval: Duration::from_millis(self.polling.normal_interval_ms),
            active_window: Duration::from_millis(self.polling.active_window_ms),
            max_active_ticks: self.polling.max_active_ticks,
        };
        config.validate()?;
        Ok(config)
    }
}
