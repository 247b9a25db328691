//! Chart series requests and indicator parameters

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{DashboardError, DashboardResult};
use crate::pyramid::{BlockTime, PyramidStyle, Timeframe};

/// Indicator types the chart endpoint understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
    Macd,
    Bollinger,
    Stochastic,
    SupportResistance,
}

impl IndicatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::Sma => "sma",
            IndicatorKind::Ema => "ema",
            IndicatorKind::Rsi => "rsi",
            IndicatorKind::Macd => "macd",
            IndicatorKind::Bollinger => "bollinger",
            IndicatorKind::Stochastic => "stochastic",
            IndicatorKind::SupportResistance => "supportresistance",
        }
    }

    /// Upper bound for period-like settings
    fn max_period(&self) -> u32 {
        match self {
            IndicatorKind::Sma | IndicatorKind::Ema => 200,
            _ => 50,
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndicatorKind {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sma" => Ok(IndicatorKind::Sma),
            "ema" => Ok(IndicatorKind::Ema),
            "rsi" => Ok(IndicatorKind::Rsi),
            "macd" => Ok(IndicatorKind::Macd),
            "bollinger" => Ok(IndicatorKind::Bollinger),
            "stochastic" => Ok(IndicatorKind::Stochastic),
            "supportresistance" | "support_resistance" => Ok(IndicatorKind::SupportResistance),
            other => Err(DashboardError::Parse(format!("unknown indicator '{}'", other))),
        }
    }
}

/// Tunable parameters of one indicator instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorSettings {
    Sma { period: u32 },
    Ema { period: u32 },
    Rsi { period: u32 },
    Macd { fast: u32, slow: u32, signal: u32 },
    Bollinger { period: u32, std_dev: u32 },
    Stochastic { k: u32, k_smooth: u32, d_smooth: u32 },
    SupportResistance,
}

impl IndicatorSettings {
    pub fn defaults(kind: IndicatorKind) -> Self {
        match kind {
            IndicatorKind::Sma => IndicatorSettings::Sma { period: 20 },
            IndicatorKind::Ema => IndicatorSettings::Ema { period: 12 },
            IndicatorKind::Rsi => IndicatorSettings::Rsi { period: 14 },
            IndicatorKind::Macd => IndicatorSettings::Macd { fast: 12, slow: 26, signal: 9 },
            IndicatorKind::Bollinger => IndicatorSettings::Bollinger { period: 20, std_dev: 2 },
            IndicatorKind::Stochastic => IndicatorSettings::Stochastic { k: 14, k_smooth: 3, d_smooth: 3 },
            IndicatorKind::SupportResistance => IndicatorSettings::SupportResistance,
        }
    }

    pub fn kind(&self) -> IndicatorKind {
        match self {
            IndicatorSettings::Sma { .. } => IndicatorKind::Sma,
            IndicatorSettings::Ema { .. } => IndicatorKind::Ema,
            IndicatorSettings::Rsi { .. } => IndicatorKind::Rsi,
            IndicatorSettings::Macd { .. } => IndicatorKind::Macd,
            IndicatorSettings::Bollinger { .. } => IndicatorKind::Bollinger,
            IndicatorSettings::Stochastic { .. } => IndicatorKind::Stochastic,
            IndicatorSettings::SupportResistance => IndicatorKind::SupportResistance,
        }
    }

    /// Update one named setting, clamped to `1..=max_period` for the kind
    pub fn set(&mut self, name: &str, value: u32) -> DashboardResult<()> {
        let value = value.clamp(1, self.kind().max_period());
        let slot = match (self, name) {
            (IndicatorSettings::Sma { period }, "period")
            | (IndicatorSettings::Ema { period }, "period")
            | (IndicatorSettings::Rsi { period }, "period")
            | (IndicatorSettings::Bollinger { period, .. }, "period") => period,
            (IndicatorSettings::Bollinger { std_dev, .. }, "std") => std_dev,
            (IndicatorSettings::Macd { fast, .. }, "fast") => fast,
            (IndicatorSettings::Macd { slow, .. }, "slow") => slow,
            (IndicatorSettings::Macd { signal, .. }, "signal") => signal,
            (IndicatorSettings::Stochastic { k, .. }, "k") => k,
            (IndicatorSettings::Stochastic { k_smooth, .. }, "k_smooth") => k_smooth,
            (IndicatorSettings::Stochastic { d_smooth, .. }, "d_smooth") => d_smooth,
            (settings, _) => {
                return Err(DashboardError::Parse(format!(
                    "{} has no setting '{}'",
                    settings.kind(),
                    name
                )))
            }
        };
        *slot = value;
        Ok(())
    }

    fn params(&self) -> Vec<(&'static str, u32)> {
        match *self {
            IndicatorSettings::Sma { period }
            | IndicatorSettings::Ema { period }
            | IndicatorSettings::Rsi { period } => vec![("period", period)],
            IndicatorSettings::Macd { fast, slow, signal } => {
                vec![("fast", fast), ("slow", slow), ("signal", signal)]
            }
            IndicatorSettings::Bollinger { period, std_dev } => {
                vec![("period", period), ("std", std_dev)]
            }
            IndicatorSettings::Stochastic { k, k_smooth, d_smooth } => {
                vec![("k", k), ("k_smooth", k_smooth), ("d_smooth", d_smooth)]
            }
            IndicatorSettings::SupportResistance => vec![],
        }
    }
}

/// One active indicator on the chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub instance: u32,
    pub settings: IndicatorSettings,
}

impl Indicator {
    pub fn kind(&self) -> IndicatorKind {
        self.settings.kind()
    }

    /// `<kind>_<instance>`, e.g. `sma_2`
    pub fn id(&self) -> String {
        format!("{}_{}", self.kind(), self.instance)
    }

    /// Query parameters for the chart endpoint, prefixed with the kind
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let kind = self.kind();
        let mut pairs: Vec<(String, String)> = self
            .settings
            .params()
            .into_iter()
            .map(|(name, value)| (format!("{}_{}", kind, name), value.to_string()))
            .collect();
        pairs.push((format!("{}_instance", kind), self.instance.to_string()));
        pairs
    }
}

/// Active indicators keyed by id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorSet {
    active: BTreeMap<String, Indicator>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an indicator with default settings under the lowest free instance number
    pub fn add(&mut self, kind: IndicatorKind) -> String {
        let used: Vec<u32> = self
            .active
            .values()
            .filter(|i| i.kind() == kind)
            .map(|i| i.instance)
            .collect();
        let instance = (1..).find(|n| !used.contains(n)).unwrap_or(1);

        let indicator = Indicator {
            instance,
            settings: IndicatorSettings::defaults(kind),
        };
        let id = indicator.id();
        self.active.insert(id.clone(), indicator);
        id
    }

    pub fn remove(&mut self, id: &str) -> Option<Indicator> {
        self.active.remove(id)
    }

    pub fn update(&mut self, id: &str, setting: &str, value: u32) -> DashboardResult<()> {
        let indicator = self
            .active
            .get_mut(id)
            .ok_or_else(|| DashboardError::Parse(format!("no active indicator '{}'", id)))?;
        indicator.settings.set(setting, value)
    }

    pub fn get(&self, id: &str) -> Option<&Indicator> {
        self.active.get(id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Indicator> {
        self.active.values()
    }
}

/// Parameters of one `/api/chart-data/{tf}` request
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    pub timeframe: Timeframe,
    pub pair: String,
    pub style: PyramidStyle,
    pub indicators: Vec<Indicator>,
}

impl ChartRequest {
    pub fn path(&self) -> String {
        format!("/api/chart-data/{}", self.timeframe)
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("pair".to_string(), self.pair.clone()),
            ("pyramid_style".to_string(), self.style.to_string()),
        ];
        for indicator in &self.indicators {
            pairs.extend(indicator.query_pairs());
        }
        pairs
    }
}

/// One chart point as sent by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(alias = "time")]
    pub x: BlockTime,
    #[serde(alias = "price")]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Price series plus indicator output for the chart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    #[serde(default)]
    pub data: Vec<PricePoint>,
    /// Latest indicator values keyed by indicator name
    #[serde(default)]
    pub indicators: Value,
    /// Full indicator series keyed by indicator name
    #[serde(default)]
    pub indicators_data: Value,
}

impl PriceSeries {
    /// Parse a chart-data response body; an `error` field makes it malformed
    pub fn from_json(body: &str) -> DashboardResult<Self> {
        let value: Value = serde_json::from_str(body)?;
        if let Some(err) = value.get("error").filter(|e| !e.is_null()) {
            return Err(DashboardError::MalformedData(format!(
                "backend reported error: {}",
                err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string())
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn latest_price(&self) -> Option<f64> {
        self.data.last().map(|p| p.y)
    }

    /// Latest value of an indicator, from the summary values or the tail of its series
    pub fn latest_indicator(&self, name: &str) -> Option<f64> {
        if let Some(v) = self.indicators.get(name).and_then(Value::as_f64) {
            return Some(v);
        }
        match self.indicators_data.get(name)? {
            Value::Array(series) => series.iter().rev().find_map(|p| {
                p.as_f64()
                    .or_else(|| p.get("y").and_then(Value::as_f64))
            }),
            other => other.as_f64(),
        }
    }

    /// Last volume and the mean of the volumes before it
    pub fn volume_vs_average(&self) -> Option<(f64, f64)> {
        let volumes: Vec<f64> = self.data.iter().filter_map(|p| p.volume).collect();
        let (last, previous) = volumes.split_last()?;
        if previous.is_empty() {
            return None;
        }
        let average = previous.iter().sum::<f64>() / previous.len() as f64;
        Some((*last, average))
    }
}
