//! Dashboard runner - main event loop
//!
//! One task owns the [`DashboardState`] and the [`PollingScheduler`]. Timers,
//! user actions and fetch results all arrive through one `tokio::select!`, so
//! every state transition happens on that task. Fetches run in spawned tasks
//! and report back over a channel; whichever result arrives last is shown.

use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::time::{interval, interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};

use crate::alerts::AlertSettings;
use crate::chart::PriceSeries;
use crate::config::Settings;
use crate::dashboard::DashboardState;
use crate::errors::{DashboardError, DashboardResult};
use crate::events::UserAction;
use crate::feed::{DashboardFeed, HttpDashboardFeed};
use crate::polling::{PollActions, PollEffect, PollingScheduler};
use crate::pyramid::BlockTreeSnapshot;
use crate::render::{RenderSink, SharedFrame, TerminalSink};
use crate::server::start_server;
use crate::store::{JsonFileStore, SettingsStore};

/// How often backend liveness is checked
pub const LIVENESS_CHECK_INTERVAL: Duration = Duration::from_secs(5);

enum FetchResult {
    Dashboard(DashboardResult<BlockTreeSnapshot>),
    Chart(DashboardResult<PriceSeries>),
}

/// Event loop hosting the scheduler's timers and the feed
pub struct EventLoop {
    feed: Arc<dyn DashboardFeed>,
    store: Arc<dyn SettingsStore>,
    state: DashboardState,
    scheduler: PollingScheduler,
    sinks: Vec<Box<dyn RenderSink>>,
    repeating: Option<(u64, Interval)>,
    deadline: Option<(u64, Pin<Box<Sleep>>)>,
    results_tx: mpsc::UnboundedSender<FetchResult>,
    results_rx: mpsc::UnboundedReceiver<FetchResult>,
}

impl EventLoop {
    pub fn new(
        feed: Arc<dyn DashboardFeed>,
        store: Arc<dyn SettingsStore>,
        state: DashboardState,
        scheduler: PollingScheduler,
    ) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            feed,
            store,
            state,
            scheduler,
            sinks: Vec::new(),
            repeating: None,
            deadline: None,
            results_tx,
            results_rx,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn RenderSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Run until `quit` arrives. A closed action stream leaves polling running.
    pub async fn run(mut self, mut actions: mpsc::Receiver<UserAction>) -> DashboardResult<()> {
        info!(
            "Starting dashboard for {} ({})",
            self.state.pair(),
            self.state.style().display_name()
        );

        let start = self.scheduler.start();
        self.apply_effects(start);
        self.spawn_refresh();
        self.spawn_chart();
        self.publish().await;

        let mut liveness = interval(LIVENESS_CHECK_INTERVAL);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut actions_open = true;
        loop {
            tokio::select! {
                action = actions.recv(), if actions_open => match action {
                    Some(UserAction::Quit) => {
                        info!("Dashboard stopped");
                        break;
                    }
                    Some(action) => self.handle_action(action).await,
                    None => {
                        info!("Action stream closed, polling continues");
                        actions_open = false;
                    }
                },
                generation = next_tick(&mut self.repeating) => {
                    let effects = self.scheduler.on_tick(generation);
                    let status_changed = effects.started_interval().is_some();
                    self.apply_effects(effects);
                    if status_changed {
                        self.publish().await;
                    }
                }
                generation = next_deadline(&mut self.deadline) => {
                    // A fired sleep stays ready, so the slot is cleared first
                    self.deadline = None;
                    let effects = self.scheduler.on_deadline(generation);
                    self.apply_effects(effects);
                    self.publish().await;
                }
                Some(result) = self.results_rx.recv() => {
                    self.handle_result(result);
                    self.publish().await;
                }
                _ = liveness.tick() => {
                    if self.state.check_backend(Utc::now()) {
                        self.publish().await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn handle_action(&mut self, action: UserAction) {
        debug!("User action: {}", action);
        match &action {
            UserAction::PairChange(pair) => {
                self.state.change_pair(pair.clone());
                self.spawn_settings_sync();
                self.spawn_chart();
            }
            UserAction::PyramidStyleChange(style) => {
                self.state.change_style(*style);
                self.spawn_settings_sync();
            }
            UserAction::TimeframeChange(tf) => {
                self.state.change_timeframe(*tf);
                self.spawn_chart();
            }
            UserAction::ExpandToggle(id) => {
                self.state.toggle_expand(id);
            }
            UserAction::AlertToggle { setting, enabled } => {
                match self.state.set_alert(setting, *enabled) {
                    Ok(settings) => {
                        settings.save(self.store.as_ref());
                    }
                    Err(e) => warn!("Ignoring alert toggle: {}", e),
                }
            }
            UserAction::Quit => {}
            UserAction::Other(kind) => debug!("No handler for action '{}'", kind),
        }

        let effects = self.scheduler.on_user_action(&action);
        self.apply_effects(effects);
        self.publish().await;
    }

    fn handle_result(&mut self, result: FetchResult) {
        match result {
            FetchResult::Dashboard(result) => self.state.apply_refresh(result, Utc::now()),
            FetchResult::Chart(result) => self.state.apply_chart(result),
        }
    }

    fn apply_effects(&mut self, actions: PollActions) {
        for effect in actions {
            match effect {
                PollEffect::CancelRepeating => self.repeating = None,
                PollEffect::StartRepeating {
                    generation,
                    interval: period,
                } => {
                    let mut timer = interval_at(Instant::now() + period, period);
                    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    self.repeating = Some((generation, timer));
                }
                PollEffect::CancelDeadline => self.deadline = None,
                PollEffect::ArmDeadline { generation, after } => {
                    self.deadline = Some((generation, Box::pin(sleep(after))));
                }
                PollEffect::Refresh => self.spawn_refresh(),
            }
        }
    }

    fn spawn_refresh(&self) {
        let feed = Arc::clone(&self.feed);
        let query = self.state.query();
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let result = feed.fetch_dashboard_data(&query).await;
            // Receiver only goes away on shutdown
            let _ = tx.send(FetchResult::Dashboard(result));
        });
    }

    fn spawn_chart(&self) {
        let feed = Arc::clone(&self.feed);
        let request = self.state.chart_request();
        let tx = self.results_tx.clone();
        tokio::spawn(async move {
            let result = feed.fetch_chart_series(&request).await;
            let _ = tx.send(FetchResult::Chart(result));
        });
    }

    fn spawn_settings_sync(&self) {
        let feed = Arc::clone(&self.feed);
        let query = self.state.query();
        tokio::spawn(async move {
            if let Err(e) = feed.update_backend_settings(&query).await {
                warn!("Failed to update backend settings: {}", e);
            }
        });
    }

    async fn publish(&mut self) {
        let frame = self.state.frame(self.scheduler.status());
        for sink in &mut self.sinks {
            sink.mount(&frame).await;
        }
    }
}

async fn next_tick(repeating: &mut Option<(u64, Interval)>) -> u64 {
    match repeating {
        Some((generation, timer)) => {
            timer.tick().await;
            *generation
        }
        None => std::future::pending().await,
    }
}

async fn next_deadline(deadline: &mut Option<(u64, Pin<Box<Sleep>>)>) -> u64 {
    match deadline {
        Some((generation, timer)) => {
            timer.as_mut().await;
            *generation
        }
        None => std::future::pending().await,
    }
}

/// Runner for the dashboard
pub struct DashboardRunner {
    config: Settings,
}

impl DashboardRunner {
    /// Create a new runner from a configuration file
    pub fn new(config_path: impl AsRef<Path>) -> DashboardResult<Self> {
        let path = config_path.as_ref();
        let path = path
            .to_str()
            .ok_or_else(|| DashboardError::Config(format!("non UTF-8 config path {:?}", path)))?;
        Ok(Self {
            config: Settings::new(path)?,
        })
    }

    pub fn from_settings(config: Settings) -> Self {
        Self { config }
    }

    pub fn settings(&self) -> &Settings {
        &self.config
    }

    /// Run the dashboard, reading user actions from `actions`
    pub async fn run(self, actions: mpsc::Receiver<UserAction>) -> DashboardResult<()> {
        // 1. Setup Logging
        if std::env::var("RUST_LOG").is_err() {
            std::env::set_var("RUST_LOG", &self.config.log.level);
        }
        env_logger::try_init().ok();

        info!("Starting DashboardRunner...");

        // 2. Validate startup values
        let polling = self.config.polling_config()?;
        let style = self.config.dashboard.style()?;
        let timeframe = self.config.dashboard.timeframe()?;
        let indicators = self.config.dashboard.indicator_set()?;

        // 3. Backend feed and settings store
        let feed = HttpDashboardFeed::new(&self.config.api.base_url, self.config.api.request_timeout())?;
        info!("Using backend at {}", feed.base_url());
        let store = JsonFileStore::new(&self.config.dashboard.settings_file);
        let alert_settings = AlertSettings::load(&store);

        let state = DashboardState::new(self.config.dashboard.pair.clone(), style, timeframe)
            .with_indicators(indicators)
            .with_alert_settings(alert_settings);

        let mut event_loop = EventLoop::new(
            Arc::new(feed),
            Arc::new(store),
            state,
            PollingScheduler::new(polling),
        )
        .with_sink(Box::new(TerminalSink::stdout()));

        // 4. Optional web server
        if self.config.server.enabled {
            let shared = SharedFrame::new();
            event_loop = event_loop.with_sink(Box::new(shared.clone()));

            let host = self.config.server.host.clone();
            let port = self.config.server.port;
            tokio::spawn(async move {
                if let Err(e) = start_server(shared, &host, port).await {
                    error!("Dashboard server stopped: {}", e);
                }
            });
        }

        // 5. Event loop
        event_loop.run(actions).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::ALERT_SETTINGS_KEY;
    use crate::dashboard::UPDATING_MESSAGE;
    use crate::feed::mock::MockFeed;
    use crate::polling::PollingMode;
    use crate::pyramid::{Block, BlockId, PyramidStyle, Timeframe};
    use crate::render::RecordingSink;
    use crate::store::MemoryStore;
    use tokio::task::JoinHandle;

    struct Harness {
        feed: MockFeed,
        store: Arc<MemoryStore>,
        sink: RecordingSink,
        actions: mpsc::Sender<UserAction>,
        handle: JoinHandle<DashboardResult<()>>,
    }

    fn snapshot() -> BlockTreeSnapshot {
        BlockTreeSnapshot::new(vec![Block::new(Timeframe::H4, 0)
            .with_ohlc(1.1000, 1.1050, 1.1000, 1.1030)
            .with_children(vec![Block::new(Timeframe::H1, 3600).with_momentum("up")])])
    }

    fn start() -> Harness {
        let feed = MockFeed::new(snapshot());
        let store = Arc::new(MemoryStore::new());
        let sink = RecordingSink::new();
        let (actions, rx) = mpsc::channel(16);

        let event_loop = EventLoop::new(
            Arc::new(feed.clone()),
            store.clone(),
            DashboardState::new("EUR/USD", PyramidStyle::Daily, Timeframe::H1),
            PollingScheduler::default(),
        )
        .with_sink(Box::new(sink.clone()));
        let handle = tokio::spawn(event_loop.run(rx));

        Harness {
            feed,
            store,
            sink,
            actions,
            handle,
        }
    }

    async fn at(secs: f64) {
        sleep(Duration::from_secs_f64(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_load_and_normal_cadence() {
        let h = start();
        at(0.1).await;

        assert_eq!(h.feed.fetch_count(), 1);
        let frame = h.sink.last().await.unwrap();
        assert_eq!(frame.tree.node_count(), 2);
        assert_eq!(frame.status.headline, "EUR/USD • Daily");
        assert_eq!(frame.polling.mode, PollingMode::Normal);

        at(61.0).await;
        assert_eq!(h.feed.fetch_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pair_change_runs_active_window() {
        let h = start();
        at(0.1).await;

        h.actions.send(UserAction::PairChange("USD/JPY".into())).await.unwrap();
        at(0.1).await;
        let frame = h.sink.last().await.unwrap();
        assert_eq!(frame.polling.mode, PollingMode::Active);
        assert_eq!(frame.pair, "USD/JPY");
        assert_eq!(h.feed.fetch_count(), 2);

        // Four active ticks refresh, the fifth switches back
        at(11.0).await;
        assert_eq!(h.feed.fetch_count(), 6);
        assert_eq!(h.sink.last().await.unwrap().polling.mode, PollingMode::Normal);

        at(28.0).await;
        assert_eq!(h.feed.fetch_count(), 6);
        at(3.0).await;
        assert_eq!(h.feed.fetch_count(), 7);

        let queries = h.feed.queries.lock().await;
        assert_eq!(queries.last().unwrap().pair, "USD/JPY");
        assert_eq!(h.feed.settings_updates.lock().await[0].symbol(), "USDJPY");
        assert_eq!(h.feed.chart_requests.lock().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_actions_do_not_boost() {
        let h = start();
        at(0.1).await;

        h.actions.send(UserAction::TimeframeChange(Timeframe::M5)).await.unwrap();
        h.actions.send(UserAction::ExpandToggle(BlockId::from("H4_0"))).await.unwrap();
        at(0.1).await;

        assert_eq!(h.feed.fetch_count(), 1);
        let frame = h.sink.last().await.unwrap();
        assert_eq!(frame.polling.mode, PollingMode::Normal);
        assert_eq!(frame.timeframe, Timeframe::M5);
        assert!(frame.tree.roots[0].expanded);
        assert_eq!(h.feed.chart_requests.lock().await[1].timeframe, Timeframe::M5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_tree() {
        let h = start();
        at(0.1).await;

        h.feed.set_should_fail(true).await;
        at(30.0).await;

        let frame = h.sink.last().await.unwrap();
        assert_eq!(h.feed.fetch_count(), 2);
        assert_eq!(frame.tree.node_count(), 2);
        assert_eq!(frame.status.headline, UPDATING_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_action_stream_keeps_polling() {
        let h = start();
        drop(h.actions);
        at(0.1).await;
        assert_eq!(h.feed.fetch_count(), 1);

        at(95.0).await;
        assert!(!h.handle.is_finished());
        assert_eq!(h.feed.fetch_count(), 4);
        h.handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_toggle_persists_and_quit_stops() {
        let h = start();
        at(0.1).await;

        h.actions
            .send(UserAction::AlertToggle {
                setting: "rsi_alerts".into(),
                enabled: false,
            })
            .await
            .unwrap();
        h.actions.send(UserAction::Quit).await.unwrap();

        h.handle.await.unwrap().unwrap();
        let saved = h.store.load_setting(ALERT_SETTINGS_KEY).unwrap().unwrap();
        assert_eq!(saved["rsi_alerts"], false);
        // Initial frame, initial fetch results and the toggle
        assert!(h.sink.len().await >= 2);
    }
}
