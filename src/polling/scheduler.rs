//! Adaptive polling state machine
//!
//! Two modes: `Normal` polls every 30s, `Active` every 2s. A pair or pyramid
//! style change switches to `Active`, refreshes immediately and arms a 10s
//! deadline. Active mode ends at whichever comes first: the deadline, or the
//! fifth active tick (which switches modes instead of refreshing).
//!
//! The scheduler owns no timers. Each transition returns the [`PollActions`]
//! a host has to perform, see [`super::virtual_clock`] and [`crate::runner`].

use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::action::{PollActions, PollEffect};
use crate::errors::{DashboardError, DashboardResult};
use crate::events::UserAction;

pub const ACTIVE_INTERVAL: Duration = Duration::from_millis(2_000);
pub const NORMAL_INTERVAL: Duration = Duration::from_millis(30_000);
pub const ACTIVE_WINDOW: Duration = Duration::from_millis(10_000);
pub const MAX_ACTIVE_TICKS: u32 = 5;

/// Polling cadence parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub active_interval: Duration,
    pub normal_interval: Duration,
    pub active_window: Duration,
    pub max_active_ticks: u32,
}

impl PollingConfig {
    pub fn validate(&self) -> DashboardResult<()> {
        if self.active_interval.is_zero() || self.normal_interval.is_zero() {
            return Err(DashboardError::Config(
                "polling intervals must be greater than zero".into(),
            ));
        }
        if self.max_active_ticks == 0 {
            return Err(DashboardError::Config(
                "max_active_ticks must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            active_interval: ACTIVE_INTERVAL,
            normal_interval: NORMAL_INTERVAL,
            active_window: ACTIVE_WINDOW,
            max_active_ticks: MAX_ACTIVE_TICKS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PollingMode {
    Normal,
    Active,
}

/// Diagnostic snapshot of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingStatus {
    pub mode: PollingMode,
    pub active_poll_count: u32,
    pub max_active_polls: u32,
    pub current_interval_ms: u64,
    pub deadline_pending: bool,
}

impl PollingStatus {
    pub fn current_interval(&self) -> Duration {
        Duration::from_millis(self.current_interval_ms)
    }
}

/// Adaptive polling scheduler
#[derive(Debug, Clone)]
pub struct PollingScheduler {
    config: PollingConfig,
    mode: PollingMode,
    active_poll_count: u32,
    /// Generation of the live repeating timer
    repeating: Option<u64>,
    /// Generation of the pending reversion deadline
    deadline: Option<u64>,
    next_generation: u64,
}

impl PollingScheduler {
    pub fn new(config: PollingConfig) -> Self {
        Self {
            config,
            mode: PollingMode::Normal,
            active_poll_count: 0,
            repeating: None,
            deadline: None,
            next_generation: 1,
        }
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    pub fn mode(&self) -> PollingMode {
        self.mode
    }

    /// Interval of the repeating timer for the current mode
    pub fn current_interval(&self) -> Duration {
        match self.mode {
            PollingMode::Normal => self.config.normal_interval,
            PollingMode::Active => self.config.active_interval,
        }
    }

    /// Start (or restart) the repeating timer for the current mode
    pub fn start(&mut self) -> PollActions {
        let mut actions = PollActions::none();
        self.restart_repeating(&mut actions);
        info!(
            "Starting {:?} polling: {}ms interval",
            self.mode,
            self.current_interval().as_millis()
        );
        actions
    }

    /// React to a user action; only pair and style changes enter active mode
    pub fn on_user_action(&mut self, action: &UserAction) -> PollActions {
        if !action.boosts_polling() {
            debug!("Skipping active polling for {}", action.kind());
            return PollActions::none();
        }

        info!("User action {}: switching to active polling", action.kind());
        let mut actions = PollActions::none();

        self.mode = PollingMode::Active;
        self.active_poll_count = 0;

        if self.deadline.take().is_some() {
            actions.push(PollEffect::CancelDeadline);
        }
        let generation = self.allocate_generation();
        self.deadline = Some(generation);
        actions.push(PollEffect::ArmDeadline {
            generation,
            after: self.config.active_window,
        });

        actions.push(PollEffect::Refresh);
        self.restart_repeating(&mut actions);
        actions
    }

    /// A tick of the repeating timer
    pub fn on_tick(&mut self, generation: u64) -> PollActions {
        if self.repeating != Some(generation) {
            debug!("Dropping tick from stale timer #{}", generation);
            return PollActions::none();
        }

        if self.mode == PollingMode::Active {
            self.active_poll_count += 1;
            debug!("Active poll #{}", self.active_poll_count);

            if self.active_poll_count >= self.config.max_active_ticks {
                info!("Max active polls reached, returning to normal polling");
                let mut actions = PollActions::none();
                self.return_to_normal(&mut actions);
                return actions;
            }
        }

        PollActions::single(PollEffect::Refresh)
    }

    /// The reversion deadline fired
    pub fn on_deadline(&mut self, generation: u64) -> PollActions {
        if self.deadline != Some(generation) {
            debug!("Dropping stale deadline #{}", generation);
            return PollActions::none();
        }
        self.deadline = None;

        let mut actions = PollActions::none();
        if self.mode == PollingMode::Active {
            info!("Active window elapsed, returning to normal polling");
            self.return_to_normal(&mut actions);
        }
        actions
    }

    pub fn status(&self) -> PollingStatus {
        PollingStatus {
            mode: self.mode,
            active_poll_count: self.active_poll_count,
            max_active_polls: self.config.max_active_ticks,
            current_interval_ms: self.current_interval().as_millis() as u64,
            deadline_pending: self.deadline.is_some(),
        }
    }

    fn return_to_normal(&mut self, actions: &mut PollActions) {
        self.mode = PollingMode::Normal;
        self.active_poll_count = 0;
        if self.deadline.take().is_some() {
            actions.push(PollEffect::CancelDeadline);
        }
        self.restart_repeating(actions);
    }

    fn restart_repeating(&mut self, actions: &mut PollActions) {
        if self.repeating.take().is_some() {
            actions.push(PollEffect::CancelRepeating);
        }
        let generation = self.allocate_generation();
        self.repeating = Some(generation);
        actions.push(PollEffect::StartRepeating {
            generation,
            interval: self.current_interval(),
        });
    }

    fn allocate_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }
}

impl Default for PollingScheduler {
    fn default() -> Self {
        Self::new(PollingConfig::default())
    }
}
