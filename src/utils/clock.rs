use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Source of "now" for liveness decisions.
///
/// Deadness is decided on the monotonic instant; the wall-clock value is only
/// carried along for reporting.
pub trait LivenessClock: Send + Sync {
    fn now(&self) -> Instant;

    fn wall_now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl LivenessClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
pub struct ManualClock {
    start: Instant,
    start_wall: DateTime<Utc>,
    offset: parking_lot::Mutex<Duration>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            start_wall: Utc::now(),
            offset: parking_lot::Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

#[cfg(test)]
impl LivenessClock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock()
    }

    fn wall_now(&self) -> DateTime<Utc> {
        let offset = *self.offset.lock();
        self.start_wall + chrono::Duration::from_std(offset).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

/// Elapsed time between two instants, zero if `later` is actually earlier.
pub fn elapsed_between(earlier: Instant, later: Instant) -> Duration {
    later.saturating_duration_since(earlier)
}
