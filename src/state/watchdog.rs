use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::models::StatusSnapshot;
use crate::utils::clock::{elapsed_between, LivenessClock};

/// Every field the request handlers and the detection loop race on.
///
/// Kept behind a single mutex so that "is the gate locked?" and "flip the
/// chill flag" can never be interleaved with another writer.
struct Inner {
    last_heartbeat: Instant,
    last_heartbeat_at: DateTime<Utc>,
    // last heartbeat as seen when the latest death episode began
    lost_heartbeat_at: Option<DateTime<Utc>>,
    chilled: bool,
    detection_lock_held: bool,
}

/// Liveness state of the one monitored process.
///
/// Acts both as the heartbeat tracker (last seen, dead or not) and as the
/// chill gate (suspended flag plus the lock held while death actions run).
pub struct WatchdogState {
    clock: Arc<dyn LivenessClock>,
    threshold: Duration,
    inner: Mutex<Inner>,
}

impl WatchdogState {
    /// Starts chilled, with the last heartbeat set to "now".
    pub fn new(clock: Arc<dyn LivenessClock>, threshold: Duration) -> Self {
        let inner = Inner {
            last_heartbeat: clock.now(),
            last_heartbeat_at: clock.wall_now(),
            lost_heartbeat_at: None,
            chilled: true,
            detection_lock_held: false,
        };
        Self {
            clock,
            threshold,
            inner: Mutex::new(inner),
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn record_heartbeat(&self) {
        let mut inner = self.inner.lock();
        inner.last_heartbeat = self.clock.now();
        inner.last_heartbeat_at = self.clock.wall_now();
    }

    /// Records a heartbeat and clears the chill flag in one step.
    ///
    /// The timestamp is always updated. Returns whether the unchill applied;
    /// it does not while a death episode holds the gate.
    pub fn beat(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.last_heartbeat = self.clock.now();
        inner.last_heartbeat_at = self.clock.wall_now();
        Self::apply_chill(&mut inner, false)
    }

    pub fn is_dead(&self) -> bool {
        let inner = self.inner.lock();
        self.is_dead_locked(&inner)
    }

    /// Sets the chill flag unless the detection lock is held.
    ///
    /// The no-op path is not an error; the return value only says whether
    /// the request took effect.
    pub fn set_chilled(&self, chilled: bool) -> bool {
        let mut inner = self.inner.lock();
        Self::apply_chill(&mut inner, chilled)
    }

    pub fn is_chilled(&self) -> bool {
        self.inner.lock().chilled
    }

    pub fn is_detection_locked(&self) -> bool {
        self.inner.lock().detection_lock_held
    }

    pub fn last_heartbeat_at(&self) -> DateTime<Utc> {
        self.inner.lock().last_heartbeat_at
    }

    /// The last heartbeat before the most recent death episode started.
    ///
    /// Heartbeats recorded while the actions run do not move it. Falls back
    /// to the current last heartbeat if no episode has happened yet.
    pub fn heartbeat_lost_at(&self) -> DateTime<Utc> {
        let inner = self.inner.lock();
        inner.lost_heartbeat_at.unwrap_or(inner.last_heartbeat_at)
    }

    /// Starts a death episode if the process is dead and detection is active.
    ///
    /// On success the gate is locked and chilled; both happen under the same
    /// acquisition as the deadness check. The lock is released when the
    /// returned guard drops, the chill flag stays set.
    pub fn try_begin_episode(&self) -> Option<GateLock<'_>> {
        let mut inner = self.inner.lock();
        if inner.chilled || inner.detection_lock_held || !self.is_dead_locked(&inner) {
            return None;
        }
        inner.detection_lock_held = true;
        inner.chilled = true;
        inner.lost_heartbeat_at = Some(inner.last_heartbeat_at);
        Some(GateLock { state: self })
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let inner = self.inner.lock();
        let since = elapsed_between(inner.last_heartbeat, self.clock.now());
        StatusSnapshot {
            chilled: inner.chilled,
            detection_lock_held: inner.detection_lock_held,
            last_heartbeat: inner.last_heartbeat_at,
            seconds_since_heartbeat: since.as_secs_f64(),
            dead: since > self.threshold,
        }
    }

    fn is_dead_locked(&self, inner: &Inner) -> bool {
        elapsed_between(inner.last_heartbeat, self.clock.now()) > self.threshold
    }

    fn apply_chill(inner: &mut Inner, chilled: bool) -> bool {
        if inner.detection_lock_held {
            debug!(requested = chilled, "chill change ignored, death episode in progress");
            return false;
        }
        inner.chilled = chilled;
        true
    }
}

/// Held for the duration of a death episode.
pub struct GateLock<'a> {
    state: &'a WatchdogState,
}

impl Drop for GateLock<'_> {
    fn drop(&mut self) {
        self.state.inner.lock().detection_lock_held = false;
    }
}
