//! Deterministic timer host for the polling scheduler
//!
//! Runs a [`PollingScheduler`] against simulated time so cadence behaviour can
//! be checked without sleeping. Timers due at the same instant fire in the
//! order they were armed.

use std::time::Duration;

use crate::events::UserAction;

use super::action::{PollActions, PollEffect};
use super::scheduler::{PollingScheduler, PollingStatus};

#[derive(Debug, Clone, Copy)]
struct RepeatingTimer {
    generation: u64,
    interval: Duration,
    next_due: Duration,
    armed_seq: u64,
}

#[derive(Debug, Clone, Copy)]
struct DeadlineTimer {
    generation: u64,
    due: Duration,
    armed_seq: u64,
}

enum Due {
    Tick(u64),
    Deadline(u64),
}

/// Scheduler plus simulated timers and a log of refresh instants
#[derive(Debug)]
pub struct VirtualClock {
    scheduler: PollingScheduler,
    now: Duration,
    repeating: Option<RepeatingTimer>,
    deadline: Option<DeadlineTimer>,
    armed_seq: u64,
    refreshes: Vec<Duration>,
}

impl VirtualClock {
    /// Start the scheduler at time zero
    pub fn new(mut scheduler: PollingScheduler) -> Self {
        let actions = scheduler.start();
        let mut clock = Self {
            scheduler,
            now: Duration::ZERO,
            repeating: None,
            deadline: None,
            armed_seq: 0,
            refreshes: Vec::new(),
        };
        clock.apply(actions);
        clock
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn status(&self) -> PollingStatus {
        self.scheduler.status()
    }

    /// Instants at which a refresh was requested
    pub fn refreshes(&self) -> &[Duration] {
        &self.refreshes
    }

    pub fn user_action(&mut self, action: &UserAction) {
        let actions = self.scheduler.on_user_action(action);
        self.apply(actions);
    }

    /// Move time forward, firing every timer that falls due on the way
    pub fn advance(&mut self, by: Duration) {
        let target = self.now + by;

        while let Some((at, due)) = self.next_due(target) {
            self.now = at;
            let actions = match due {
                Due::Tick(generation) => {
                    if let Some(timer) = self.repeating.as_mut() {
                        timer.next_due += timer.interval;
                    }
                    self.scheduler.on_tick(generation)
                }
                Due::Deadline(generation) => {
                    self.deadline = None;
                    self.scheduler.on_deadline(generation)
                }
            };
            self.apply(actions);
        }

        self.now = target;
    }

    fn next_due(&self, limit: Duration) -> Option<(Duration, Due)> {
        let tick = self
            .repeating
            .filter(|t| t.next_due <= limit)
            .map(|t| (t.next_due, t.armed_seq, Due::Tick(t.generation)));
        let deadline = self
            .deadline
            .filter(|d| d.due <= limit)
            .map(|d| (d.due, d.armed_seq, Due::Deadline(d.generation)));

        match (tick, deadline) {
            (Some(t), Some(d)) => {
                if (d.0, d.1) < (t.0, t.1) {
                    Some((d.0, d.2))
                } else {
                    Some((t.0, t.2))
                }
            }
            (Some(t), None) => Some((t.0, t.2)),
            (None, Some(d)) => Some((d.0, d.2)),
            (None, None) => None,
        }
    }

    fn apply(&mut self, actions: PollActions) {
        for effect in actions {
            match effect {
                PollEffect::CancelRepeating => self.repeating = None,
                PollEffect::StartRepeating { generation, interval } => {
                    self.armed_seq += 1;
                    self.repeating = Some(RepeatingTimer {
                        generation,
                        interval,
                        next_due: self.now + interval,
                        armed_seq: self.armed_seq,
                    });
                }
                PollEffect::CancelDeadline => self.deadline = None,
                PollEffect::ArmDeadline { generation, after } => {
                    self.armed_seq += 1;
                    self.deadline = Some(DeadlineTimer {
                        generation,
                        due: self.now + after,
                        armed_seq: self.armed_seq,
                    });
                }
                PollEffect::Refresh => self.refreshes.push(self.now),
            }
        }
    }
}
