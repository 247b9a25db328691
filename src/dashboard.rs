//! Dashboard context: every piece of mutable UI state behind one owner
//!
//! The runtime owns a single [`DashboardState`] and mutates it only from its
//! event loop, so no locking is needed here. Each method is one atomic
//! transition: a user choice, a fetch result, or a liveness check.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::alerts::{AlertBook, AlertSettings};
use crate::chart::{ChartRequest, IndicatorSet, PriceSeries};
use crate::errors::{DashboardError, DashboardResult};
use crate::feed::PyramidQuery;
use crate::polling::PollingStatus;
use crate::pyramid::{
    render_tree, timeframe_strengths, BlockId, BlockTreeSnapshot, ExpandedSet, PyramidStyle,
    RenderedTree, Timeframe, TimeframeVisibility,
};
use crate::render::RenderFrame;

/// Without data for this long the backend is shown as offline
pub const OFFLINE_AFTER_SECS: i64 = 35;

pub const LOADING_MESSAGE: &str = "Loading market data...";
pub const UPDATING_MESSAGE: &str = "Updating market data...";
pub const CONNECTING_MESSAGE: &str = "Connecting to data source...";

/// Headline and detail shown above the pyramid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLine {
    pub headline: String,
    pub detail: String,
    pub backend_online: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

/// The dashboard's UI state
#[derive(Debug)]
pub struct DashboardState {
    pair: String,
    style: PyramidStyle,
    timeframe: Timeframe,
    visibility: TimeframeVisibility,
    expanded: ExpandedSet,
    snapshot: Option<BlockTreeSnapshot>,
    tree: RenderedTree,
    status: StatusLine,
    indicators: IndicatorSet,
    chart: Option<PriceSeries>,
    chart_status: String,
    alert_settings: AlertSettings,
    alerts: AlertBook,
}

impl DashboardState {
    pub fn new(pair: impl Into<String>, style: PyramidStyle, timeframe: Timeframe) -> Self {
        Self {
            pair: pair.into(),
            style,
            timeframe,
            visibility: TimeframeVisibility::for_style(style),
            expanded: ExpandedSet::new(),
            snapshot: None,
            tree: RenderedTree::default(),
            status: StatusLine {
                headline: LOADING_MESSAGE.to_string(),
                detail: String::new(),
                backend_online: true,
                last_updated: None,
            },
            indicators: IndicatorSet::new(),
            chart: None,
            chart_status: String::new(),
            alert_settings: AlertSettings::default(),
            alerts: AlertBook::new(),
        }
    }

    pub fn with_indicators(mut self, indicators: IndicatorSet) -> Self {
        self.indicators = indicators;
        self
    }

    pub fn with_alert_settings(mut self, settings: AlertSettings) -> Self {
        self.alert_settings = settings;
        self
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn style(&self) -> PyramidStyle {
        self.style
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn visibility(&self) -> &TimeframeVisibility {
        &self.visibility
    }

    pub fn expanded(&self) -> &ExpandedSet {
        &self.expanded
    }

    pub fn tree(&self) -> &RenderedTree {
        &self.tree
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn chart(&self) -> Option<&PriceSeries> {
        self.chart.as_ref()
    }

    pub fn alerts(&self) -> &AlertBook {
        &self.alerts
    }

    pub fn alerts_mut(&mut self) -> &mut AlertBook {
        &mut self.alerts
    }

    pub fn alert_settings(&self) -> &AlertSettings {
        &self.alert_settings
    }

    pub fn query(&self) -> PyramidQuery {
        PyramidQuery::new(self.pair.clone(), self.style)
    }

    pub fn chart_request(&self) -> ChartRequest {
        ChartRequest {
            timeframe: self.timeframe,
            pair: self.pair.clone(),
            style: self.style,
            indicators: self.indicators.iter().copied().collect(),
        }
    }

    pub fn change_pair(&mut self, pair: impl Into<String>) {
        self.pair = pair.into();
        info!("Pair changed to {}", self.pair);
        self.rerender();
    }

    /// Switch preset; the visibility filter is rewritten and the current data re-rendered
    pub fn change_style(&mut self, style: PyramidStyle) {
        self.style = style;
        self.visibility.apply_style(style);
        info!("Pyramid style changed to {}", style.display_name());
        self.rerender();
    }

    pub fn change_timeframe(&mut self, timeframe: Timeframe) {
        self.timeframe = timeframe;
        self.chart_status = format!("Loading {} {}", self.pair, timeframe);
    }

    /// Expand or collapse a block; purely local, no fetch
    pub fn toggle_expand(&mut self, id: &BlockId) -> bool {
        let expanded = self.expanded.toggle(id);
        debug!("Block {} {}", id, if expanded { "expanded" } else { "collapsed" });
        self.rerender();
        expanded
    }

    pub fn set_alert(&mut self, name: &str, enabled: bool) -> DashboardResult<AlertSettings> {
        self.alert_settings.set(name, enabled)?;
        Ok(self.alert_settings)
    }

    /// Take the outcome of a dashboard fetch
    ///
    /// Whatever arrives last wins. A failure leaves the current tree untouched.
    pub fn apply_refresh(&mut self, result: DashboardResult<BlockTreeSnapshot>, now: DateTime<Utc>) {
        match result {
            Ok(snapshot) => {
                self.snapshot = Some(snapshot);
                self.rerender();

                if self.tree.is_empty() {
                    self.status.headline = LOADING_MESSAGE.to_string();
                    self.status.detail.clear();
                } else {
                    self.status.headline = format!("{} • {}", self.pair, self.style.display_name());
                    self.status.detail = format!("Last updated: {}", now.format("%Y-%m-%d %H:%M:%S UTC"));
                    self.status.last_updated = Some(now);
                    if !self.status.backend_online {
                        info!("Backend back online");
                    }
                    self.status.backend_online = true;
                }
            }
            Err(e) => {
                error!("Dashboard update error: {}", e);
                self.status.headline = UPDATING_MESSAGE.to_string();
                self.status.detail = CONNECTING_MESSAGE.to_string();
            }
        }
    }

    /// Take the outcome of a chart fetch, running alert rules on success
    pub fn apply_chart(&mut self, result: DashboardResult<PriceSeries>) {
        match result {
            Ok(series) => {
                let raised = self.alerts.evaluate_series(&self.alert_settings, &series);
                if raised > 0 {
                    debug!("{} alert(s) raised by chart update", raised);
                }
                self.chart_status = format!("{} {}", self.pair, self.timeframe);
                self.chart = Some(series);
            }
            Err(e) => {
                warn!("Chart loading error: {}", e);
                self.chart_status = match e {
                    DashboardError::MalformedData(msg) => msg,
                    _ => "Failed to load chart data".to_string(),
                };
            }
        }
    }

    /// Mark the backend offline after a long silence; returns true on a change
    pub fn check_backend(&mut self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.status.last_updated else {
            return false;
        };
        let silent = now - last > ChronoDuration::seconds(OFFLINE_AFTER_SECS);
        if silent && self.status.backend_online {
            warn!("Backend appears offline: no data since {}", last);
            self.status.backend_online = false;
            return true;
        }
        false
    }

    /// Snapshot of everything a surface needs to draw
    pub fn frame(&self, polling: PollingStatus) -> RenderFrame {
        RenderFrame {
            pair: self.pair.clone(),
            style: self.style,
            timeframe: self.timeframe,
            status: self.status.clone(),
            tree: self.tree.clone(),
            strengths: self
                .snapshot
                .as_ref()
                .map(|snapshot| timeframe_strengths(&snapshot.blocks))
                .unwrap_or_default(),
            polling,
            chart_status: self.chart_status.clone(),
            latest_price: self.chart.as_ref().and_then(PriceSeries::latest_price),
            alerts: self.alerts.snapshot(),
        }
    }

    fn rerender(&mut self) {
        if let Some(snapshot) = &self.snapshot {
            self.tree = render_tree(&snapshot.blocks, &self.visibility, &self.expanded, &self.pair);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pyramid::Block;

    fn snapshot_with(ids: &[i64]) -> BlockTreeSnapshot {
        BlockTreeSnapshot::new(vec![Block::new(Timeframe::H4, 0)
            .with_ohlc(1.1, 1.1050, 1.1, 1.1)
            .with_children(
                ids.iter()
                    .map(|t| Block::new(Timeframe::H1, *t).with_momentum("up"))
                    .collect(),
            )])
    }

    fn state() -> DashboardState {
        DashboardState::new("EUR/USD", PyramidStyle::Daily, Timeframe::H1)
    }

    #[test]
    fn test_successful_refresh_renders_and_sets_status() {
        let mut state = state();
        let now = Utc::now();
        state.apply_refresh(Ok(snapshot_with(&[172000])), now);

        assert_eq!(state.tree().node_count(), 2);
        assert_eq!(state.status().headline, "EUR/USD • Daily");
        assert_eq!(state.status().last_updated, Some(now));
    }

    #[test]
    fn test_failed_refresh_keeps_stale_tree() {
        let mut state = state();
        state.apply_refresh(Ok(snapshot_with(&[172000])), Utc::now());
        let before = state.tree().clone();

        state.apply_refresh(Err(DashboardError::Network("HTTP 502".into())), Utc::now());
        assert_eq!(state.tree(), &before);
        assert_eq!(state.status().headline, UPDATING_MESSAGE);
        assert_eq!(state.status().detail, CONNECTING_MESSAGE);
    }

    #[test]
    fn test_expanded_block_survives_refresh() {
        let mut state = state();
        state.apply_refresh(Ok(snapshot_with(&[172000])), Utc::now());
        let id = BlockId::from("H1_172000");
        assert!(state.toggle_expand(&id));

        state.apply_refresh(Ok(snapshot_with(&[168400, 172000])), Utc::now());
        assert!(state.tree().find(&id).unwrap().expanded);

        // Id gone from newer data: no error, entry stays
        state.apply_refresh(Ok(snapshot_with(&[175600])), Utc::now());
        assert!(state.tree().find(&id).is_none());
        assert!(state.expanded().is_expanded(&id));
    }

    #[test]
    fn test_style_change_rerenders_existing_data() {
        let mut state = state();
        state.apply_refresh(Ok(snapshot_with(&[1, 2])), Utc::now());
        assert!(state.tree().roots[0].own_timeframe_visible);

        state.change_style(PyramidStyle::Intraday);
        assert!(!state.visibility().is_visible(Timeframe::H4));
        // H4 container survives for its visible H1 children
        assert!(!state.tree().roots[0].own_timeframe_visible);
        assert_eq!(state.tree().node_count(), 3);

        state.change_style(PyramidStyle::Scalper);
        assert!(state.tree().is_empty());
    }

    #[test]
    fn test_empty_render_shows_loading() {
        let mut state = DashboardState::new("EUR/USD", PyramidStyle::Scalper, Timeframe::H1);
        state.apply_refresh(Ok(snapshot_with(&[1])), Utc::now());
        assert!(state.tree().is_empty());
        assert_eq!(state.status().headline, LOADING_MESSAGE);
    }

    #[test]
    fn test_pair_change_affects_range_units() {
        let mut state = state();
        state.apply_refresh(Ok(snapshot_with(&[1])), Utc::now());
        assert_eq!(state.tree().roots[0].range_size.unwrap().value, 50);

        state.change_pair("BTC/USD");
        assert_eq!(state.query().symbol(), "BTCUSD");
        assert_eq!(state.tree().roots[0].range_size.unwrap().value, 0);
    }

    #[test]
    fn test_backend_goes_offline_and_recovers() {
        let mut state = state();
        let start = Utc::now();
        assert!(!state.check_backend(start));

        state.apply_refresh(Ok(snapshot_with(&[1])), start);
        assert!(!state.check_backend(start + ChronoDuration::seconds(30)));
        assert!(state.check_backend(start + ChronoDuration::seconds(36)));
        assert!(!state.status().backend_online);
        assert!(!state.check_backend(start + ChronoDuration::seconds(40)));

        state.apply_refresh(Ok(snapshot_with(&[1])), start + ChronoDuration::seconds(41));
        assert!(state.status().backend_online);
    }

    #[test]
    fn test_chart_updates_raise_alerts() {
        let mut state = state();
        let series = PriceSeries::from_json(r#"{"data": [], "indicators": {"rsi": 81.0}}"#).unwrap();
        state.apply_chart(Ok(series));
        assert_eq!(state.alerts().len(), 1);

        state.set_alert("rsi_alerts", false).unwrap();
        let series = PriceSeries::from_json(r#"{"data": [], "indicators": {"rsi": 85.0}}"#).unwrap();
        state.apply_chart(Ok(series));
        assert_eq!(state.alerts().len(), 1);
    }

    #[test]
    fn test_chart_failure_keeps_previous_series() {
        let mut state = state();
        let series = PriceSeries::from_json(r#"{"data": [{"x": 1, "y": 1.25}]}"#).unwrap();
        state.apply_chart(Ok(series));
        state.apply_chart(Err(DashboardError::Network("timeout".into())));

        let frame = state.frame(crate::polling::PollingScheduler::default().status());
        assert_eq!(frame.latest_price, Some(1.25));
        assert_eq!(frame.chart_status, "Failed to load chart data");
    }

    #[test]
    fn test_frame_carries_strength_per_top_level_block() {
        let mut state = state();
        assert!(state.frame(crate::polling::PollingScheduler::default().status()).strengths.is_empty());

        let snapshot = BlockTreeSnapshot::new(vec![
            Block::new(Timeframe::H4, 0)
                .with_direction(crate::pyramid::Direction::Up)
                .with_momentum("Strong up"),
            Block::new(Timeframe::H4, 14400).with_momentum("Weak"),
        ]);
        state.apply_refresh(Ok(snapshot), Utc::now());
        // Survives a failed refresh along with the tree
        state.apply_refresh(Err(DashboardError::Network("timeout".into())), Utc::now());

        let frame = state.frame(crate::polling::PollingScheduler::default().status());
        let percents: Vec<i64> = frame.strengths.iter().map(|s| s.percent()).collect();
        assert_eq!(percents, vec![90, 30]);
    }
}
