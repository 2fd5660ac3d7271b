use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::actions::{ActionRegistry, RunSummary};
use crate::state::WatchdogState;
use crate::utils::logger::log_death_detected;

/// Polls the watchdog state every `period` until `shutdown` flips or its
/// sender goes away.
///
/// The first poll happens one full period after start. An episode that is
/// already running finishes before the loop looks at `shutdown` again.
pub async fn start_detection_task(
    state: impl AsRef<WatchdogState>,
    registry: impl AsRef<ActionRegistry>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let state = state.as_ref();
    let registry = registry.as_ref();

    if *shutdown.borrow() {
        return;
    }

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Detection loop started, checking every {:?}", period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                poll_once(state, registry).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Detection loop stopping");
                    break;
                }
            }
        }
    }
}

/// One detection step. Returns the run summary if a death episode fired.
///
/// The gate stays locked for the whole `run_all` and is released even if
/// the future is dropped or an action panics; the chill flag stays set so
/// the next episode needs a heartbeat or an explicit unchill first.
pub async fn poll_once(state: &WatchdogState, registry: &ActionRegistry) -> Option<RunSummary> {
    let Some(_gate) = state.try_begin_episode() else {
        debug!("Poll: nothing to do");
        return None;
    };

    log_death_detected(state.threshold(), registry.len());
    let summary = registry.run_all().await;
    info!(
        "Death actions done: {} ran, {} failed; monitoring chilled until next heartbeat",
        summary.ran, summary.failed
    );
    Some(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::actions::{fn_action, ActionError};
    use crate::utils::clock::ManualClock;

    const THRESHOLD: Duration = Duration::from_secs(10);

    fn counting_registry(counter: &Arc<AtomicUsize>) -> ActionRegistry {
        let counter = counter.clone();
        let mut registry = ActionRegistry::new();
        registry.register(fn_action("count", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), ActionError>(())
            }
        }));
        registry
    }

    fn setup() -> (Arc<ManualClock>, WatchdogState, Arc<AtomicUsize>, ActionRegistry) {
        let clock = Arc::new(ManualClock::new());
        let state = WatchdogState::new(clock.clone(), THRESHOLD);
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(&counter);
        (clock, state, counter, registry)
    }

    #[tokio::test]
    async fn fires_once_per_dead_period() {
        // threshold 10s, poll every 1s, heartbeat at t=0 and then silence
        let (clock, state, counter, registry) = setup();
        state.beat();

        for second in 1..=30 {
            clock.advance(Duration::from_secs(1));
            let fired = poll_once(&state, &registry).await.is_some();
            assert_eq!(fired, second == 11, "unexpected result at t={}", second);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(state.is_chilled());
        assert!(!state.is_detection_locked());
    }

    #[tokio::test]
    async fn heartbeat_rearms_detection() {
        let (clock, state, counter, registry) = setup();
        state.beat();
        clock.advance(Duration::from_secs(11));
        assert!(poll_once(&state, &registry).await.is_some());

        state.beat();
        clock.advance(Duration::from_secs(5));
        assert!(poll_once(&state, &registry).await.is_none());
        clock.advance(Duration::from_secs(6));
        assert!(poll_once(&state, &registry).await.is_some());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn explicit_unchill_rearms_detection() {
        let (clock, state, counter, registry) = setup();
        state.beat();
        clock.advance(Duration::from_secs(11));
        poll_once(&state, &registry).await;

        assert!(state.set_chilled(false));
        assert!(poll_once(&state, &registry).await.is_some());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn chilled_state_never_fires() {
        let (clock, state, counter, registry) = setup();
        clock.advance(Duration::from_secs(3600));
        for _ in 0..5 {
            assert!(poll_once(&state, &registry).await.is_none());
        }

        state.beat();
        state.set_chilled(true);
        clock.advance(Duration::from_secs(3600));
        assert!(poll_once(&state, &registry).await.is_none());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn heartbeats_within_threshold_never_fire() {
        let (clock, state, counter, registry) = setup();
        for _ in 0..50 {
            state.beat();
            clock.advance(Duration::from_secs(9));
            assert!(poll_once(&state, &registry).await.is_none());
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn requests_during_episode_are_ignored() {
        let clock = Arc::new(ManualClock::new());
        let state = Arc::new(WatchdogState::new(clock.clone(), THRESHOLD));
        let observed = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut registry = ActionRegistry::new();
        let (inner_state, inner_observed) = (state.clone(), observed.clone());
        registry.register(fn_action("interfere", move || {
            let state = inner_state.clone();
            let observed = inner_observed.clone();
            async move {
                // an unchill and a heartbeat arriving mid-episode
                let unchill_applied = state.set_chilled(false);
                let beat_applied = state.beat();
                observed.lock().push((unchill_applied, beat_applied, state.is_chilled()));
                Ok::<(), ActionError>(())
            }
        }));

        state.beat();
        clock.advance(Duration::from_secs(11));
        assert!(poll_once(&state, &registry).await.is_some());

        assert_eq!(*observed.lock(), vec![(false, false, true)]);
        assert!(state.is_chilled());
        assert!(!state.is_dead());
    }

    #[tokio::test]
    async fn failing_first_action_still_runs_the_rest() {
        let clock = Arc::new(ManualClock::new());
        let state = WatchdogState::new(clock.clone(), THRESHOLD);
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut registry = ActionRegistry::new();
        registry.register(fn_action("broken", || async {
            Err::<(), _>(ActionError::Other("down".to_string()))
        }));
        for name in ["second", "third"] {
            let order = order.clone();
            registry.register(fn_action(name, move || {
                let order = order.clone();
                async move {
                    order.lock().push(name);
                    Ok::<(), ActionError>(())
                }
            }));
        }

        state.beat();
        clock.advance(Duration::from_secs(11));
        let summary = poll_once(&state, &registry).await.unwrap();
        assert_eq!(summary, RunSummary { ran: 3, failed: 1 });
        assert_eq!(*order.lock(), vec!["second", "third"]);
        assert!(!state.is_detection_locked());
    }

    #[tokio::test]
    async fn loop_stops_on_shutdown() {
        let (_, state, _, registry) = setup();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(start_detection_task(
            Arc::new(state),
            Arc::new(registry),
            Duration::from_millis(10),
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop should stop promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn loop_keeps_running_on_false_signal() {
        let (_, state, _, registry) = setup();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(start_detection_task(
            Arc::new(state),
            Arc::new(registry),
            Duration::from_millis(10),
            rx,
        ));

        tx.send(false).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop should stop promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn loop_stops_when_sender_dropped() {
        let (_, state, _, registry) = setup();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(start_detection_task(
            Arc::new(state),
            Arc::new(registry),
            Duration::from_millis(10),
            rx,
        ));

        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop should stop promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn loop_fires_on_real_ticks() {
        let clock = Arc::new(ManualClock::new());
        let state = Arc::new(WatchdogState::new(clock.clone(), THRESHOLD));
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(counting_registry(&counter));
        let (tx, rx) = watch::channel(false);

        state.beat();
        clock.advance(Duration::from_secs(11));
        let handle = tokio::spawn(start_detection_task(
            state.clone(),
            registry,
            Duration::from_millis(10),
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(tx);
        handle.await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(state.is_chilled());
    }
}
