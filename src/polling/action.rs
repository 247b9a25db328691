//! Effects requested by the polling scheduler

use std::time::Duration;

/// One side effect the timer host must carry out
///
/// Timers are identified by a generation number. A host that cannot cancel a
/// timer synchronously may still deliver its late ticks; the scheduler drops
/// any tick or deadline whose generation is no longer live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEffect {
    /// Stop the current repeating timer
    CancelRepeating,
    /// Start a repeating timer; the first tick comes one `interval` from now
    StartRepeating { generation: u64, interval: Duration },
    /// Drop the pending reversion deadline
    CancelDeadline,
    /// Arm a one-shot reversion deadline
    ArmDeadline { generation: u64, after: Duration },
    /// Fetch fresh dashboard data now
    Refresh,
}

/// Ordered list of effects returned by one scheduler transition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollActions {
    pub effects: Vec<PollEffect>,
}

impl PollActions {
    /// No effects
    pub fn none() -> Self {
        Self { effects: vec![] }
    }

    pub fn single(effect: PollEffect) -> Self {
        Self {
            effects: vec![effect],
        }
    }

    /// Append an effect (builder pattern)
    pub fn with(mut self, effect: PollEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn push(&mut self, effect: PollEffect) {
        self.effects.push(effect);
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Number of refreshes requested
    pub fn refresh_count(&self) -> usize {
        self.effects
            .iter()
            .filter(|e| matches!(e, PollEffect::Refresh))
            .count()
    }

    /// Interval of the repeating timer started by this transition, if any
    pub fn started_interval(&self) -> Option<Duration> {
        self.effects.iter().rev().find_map(|e| match e {
            PollEffect::StartRepeating { interval, .. } => Some(*interval),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &PollEffect> {
        self.effects.iter()
    }
}

impl IntoIterator for PollActions {
    type Item = PollEffect;
    type IntoIter = std::vec::IntoIter<PollEffect>;

    fn into_iter(self) -> Self::IntoIter {
        self.effects.into_iter()
    }
}
