//! Rule-based alerts and their persisted toggles

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chart::PriceSeries;
use crate::errors::{DashboardError, DashboardResult};
use crate::store::{load_or, persist_best_effort, SettingsStore};

/// Store key for [`AlertSettings`]
pub const ALERT_SETTINGS_KEY: &str = "alert_settings";

/// Alerts kept in the book; older ones drop off the end
pub const MAX_ALERTS: usize = 50;

pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_OVERSOLD: f64 = 30.0;
pub const VOLUME_SPIKE_FACTOR: f64 = 2.0;

/// Which alert rules are enabled
///
/// Saved values are merged over the defaults, so settings written by an older
/// version with fewer fields still load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub rsi_alerts: bool,
    pub price_alerts: bool,
    pub volume_alerts: bool,
    pub momentum_alerts: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            rsi_alerts: true,
            price_alerts: false,
            volume_alerts: true,
            momentum_alerts: true,
        }
    }
}

impl AlertSettings {
    /// Load from the store; any failure leaves the defaults in place
    pub fn load(store: &dyn SettingsStore) -> Self {
        load_or(store, ALERT_SETTINGS_KEY, Self::default())
    }

    pub fn save(&self, store: &dyn SettingsStore) -> bool {
        persist_best_effort(store, ALERT_SETTINGS_KEY, self)
    }

    /// Enable or disable one rule by its setting name
    pub fn set(&mut self, name: &str, enabled: bool) -> DashboardResult<()> {
        let slot = match name {
            "rsi_alerts" | "rsi" => &mut self.rsi_alerts,
            "price_alerts" | "price" => &mut self.price_alerts,
            "volume_alerts" | "volume" => &mut self.volume_alerts,
            "momentum_alerts" | "momentum" => &mut self.momentum_alerts,
            other => {
                return Err(DashboardError::Parse(format!(
                    "unknown alert setting '{}'",
                    other
                )))
            }
        };
        *slot = enabled;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Rsi,
    Volume,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Low,
    Medium,
    High,
}

impl AlertPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertPriority::Low => "low",
            AlertPriority::Medium => "medium",
            AlertPriority::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub kind: AlertKind,
    pub message: String,
    pub priority: AlertPriority,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

/// Alerts raised so far, newest first
#[derive(Debug, Clone, Default)]
pub struct AlertBook {
    alerts: VecDeque<Alert>,
}

impl AlertBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        kind: AlertKind,
        message: impl Into<String>,
        priority: AlertPriority,
    ) -> Uuid {
        let alert = Alert {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            priority,
            created_at: Utc::now(),
            resolved_at: None,
        };
        info!("ALERT [{:?}] {}", alert.kind, alert.message);

        let id = alert.id;
        self.alerts.push_front(alert);
        self.alerts.truncate(MAX_ALERTS);
        id
    }

    /// Mark an alert resolved; returns false if unknown or already resolved
    pub fn resolve(&mut self, id: Uuid) -> bool {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) if !alert.is_resolved() => {
                alert.resolved_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.alerts.clear();
    }

    pub fn test_alert(&mut self) -> Uuid {
        self.create(
            AlertKind::Test,
            "Test alert - alert system is working",
            AlertPriority::Low,
        )
    }

    pub fn check_rsi(&mut self, settings: &AlertSettings, rsi: f64) -> Option<Uuid> {
        if !settings.rsi_alerts {
            return None;
        }
        if rsi > RSI_OVERBOUGHT {
            Some(self.create(
                AlertKind::Rsi,
                format!("RSI overbought: {:.1}", rsi),
                AlertPriority::High,
            ))
        } else if rsi < RSI_OVERSOLD {
            Some(self.create(
                AlertKind::Rsi,
                format!("RSI oversold: {:.1}", rsi),
                AlertPriority::High,
            ))
        } else {
            None
        }
    }

    pub fn check_volume(&mut self, settings: &AlertSettings, current: f64, average: f64) -> Option<Uuid> {
        if !settings.volume_alerts || average <= 0.0 {
            return None;
        }
        (current > average * VOLUME_SPIKE_FACTOR).then(|| {
            self.create(
                AlertKind::Volume,
                format!("Volume spike: {:.1}x average", current / average),
                AlertPriority::Medium,
            )
        })
    }

    /// Run every rule against a freshly received chart series
    pub fn evaluate_series(&mut self, settings: &AlertSettings, series: &PriceSeries) -> usize {
        let mut raised = 0;
        if let Some(rsi) = series.latest_indicator("rsi") {
            raised += usize::from(self.check_rsi(settings, rsi).is_some());
        }
        if let Some((current, average)) = series.volume_vs_average() {
            raised += usize::from(self.check_volume(settings, current, average).is_some());
        }
        raised
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.alerts.iter().filter(|a| !a.is_resolved()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn snapshot(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }
}
