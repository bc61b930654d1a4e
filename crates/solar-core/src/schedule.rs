//! Periodic deadlines for the monitor loop

use embassy_time::{Duration, Instant};

/// Source of the current time.
///
/// Firmware reads the embassy time driver; tests and the simulator supply
/// their own.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Reads the global embassy time driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<K: Clock + ?Sized> Clock for &K {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// A task that should run once per `period`.
///
/// It is due immediately after creation. Completing a run schedules the next
/// one a full period after the completion time, so a slow run never causes a
/// burst of catch-up runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    period: Duration,
    next: Option<Instant>,
}

impl Deadline {
    pub const fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next.is_none_or(|at| now >= at)
    }

    /// `None` when due right away.
    pub fn next_due(&self) -> Option<Instant> {
        self.next
    }

    pub fn complete(&mut self, now: Instant) {
        self.next = Some(now + self.period);
    }
}

/// The earliest of several optional deadlines, where `None` means "now".
pub fn earliest(now: Instant, deadlines: &[Option<Instant>]) -> Instant {
    deadlines
        .iter()
        .map(|deadline| deadline.unwrap_or(now))
        .min()
        .unwrap_or(now)
        .max(now)
}
