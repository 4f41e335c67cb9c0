//! Debouncing for regeneration triggers.
//!
//! Editors often emit several notifications for one logical save (truncate,
//! write, chmod, rename). The debouncer holds at most one pending run and
//! pushes its deadline back on every notification, so a burst collapses
//! into a single regeneration once things go quiet.

use std::time::{Duration, Instant};

/// The single scheduled regeneration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRun {
    /// When the run fires if no further notification arrives.
    pub deadline: Instant,
    /// Notifications folded into this run.
    pub coalesced: usize,
}

/// None-scheduled / one-scheduled state machine. The latest notify wins.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<PendingRun>,
}

impl Debouncer {
    /// Creates a debouncer with the given quiescence delay.
    ///
    /// A zero delay is bumped to one millisecond so rapid events still
    /// collapse.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: delay.max(Duration::from_millis(1)),
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn pending(&self) -> Option<PendingRun> {
        self.pending
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Records a notification, replacing any scheduled run.
    pub fn notify(&mut self) {
        self.notify_at(Instant::now());
    }

    pub fn notify_at(&mut self, now: Instant) {
        let coalesced = self.pending.map_or(0, |p| p.coalesced) + 1;
        self.pending = Some(PendingRun {
            deadline: now + self.delay,
            coalesced,
        });
    }

    /// Drops the scheduled run, if any. Used at shutdown.
    pub fn cancel(&mut self) -> Option<PendingRun> {
        self.pending.take()
    }

    /// How long until the scheduled run is due. `None` when idle.
    pub fn time_until_due(&self) -> Option<Duration> {
        self.time_until_due_at(Instant::now())
    }

    pub fn time_until_due_at(&self, now: Instant) -> Option<Duration> {
        self.pending
            .map(|p| p.deadline.saturating_duration_since(now))
    }

    /// Takes the scheduled run if its deadline has passed.
    pub fn take_due(&mut self) -> Option<PendingRun> {
        self.take_due_at(Instant::now())
    }

    pub fn take_due_at(&mut self, now: Instant) -> Option<PendingRun> {
        match self.pending {
            Some(p) if p.deadline <= now => self.pending.take(),
            _ => None,
        }
    }
}
