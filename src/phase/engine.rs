//! Phase engine tick loop.
//!
//! The [`PhaseEngine`] drives the shared [`StateStore`] forward on a fixed
//! interval and reports cycle boundaries and schedule adoptions. The tick
//! itself only takes the state lock; logging, metrics and events run after
//! the lock is released.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics;
use crate::store::StateStore;

use super::state::Tick;

/// Cyclic scheduler advancing the shared state in real time.
pub struct PhaseEngine {
    store: Arc<StateStore>,
    tick_interval: Duration,
    events: Arc<EventEmitter>,
    cancel: CancellationToken,
}

impl PhaseEngine {
    /// Creates an engine ticking `store` every `tick_interval`.
    #[must_use]
    pub fn new(store: Arc<StateStore>, tick_interval: Duration, events: Arc<EventEmitter>) -> Self {
        Self {
            store,
            tick_interval,
            events,
            cancel: CancellationToken::new(),
        }
    }

    /// Shared state this engine drives.
    #[must_use]
    pub const fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Spawns the background tick task.
    ///
    /// The task runs until [`shutdown`](Self::shutdown) is called. A late
    /// tick is skipped rather than replayed; the next one catches up from
    /// the wall clock.
    pub fn start_timer_task(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let first = engine.tick_once(Instant::now());
            info!(
                cycle_length = first.cycle_length,
                tick_ms = engine.tick_interval.as_millis(),
                "phase engine started"
            );
            engine.events.emit(Event::EngineStarted {
                timestamp: Utc::now(),
                schedule: engine.store.active_schedule(),
                cycle_length: first.cycle_length,
            });

            let mut interval = tokio::time::interval(engine.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = engine.cancel.cancelled() => {
                        debug!("tick task cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        engine.tick_once(Instant::now());
                    }
                }
            }

            let cycles_completed = engine.store.cycles_completed();
            info!(cycles_completed, "phase engine stopped");
            engine.events.emit(Event::EngineStopped {
                timestamp: Utc::now(),
                reason: "shutdown".to_string(),
                cycles_completed,
            });
        })
    }

    /// Advances the cycle to `now` and reports what changed.
    pub fn tick_once(&self, now: Instant) -> Tick {
        let tick = self.store.tick(now);

        if tick.wrapped {
            let cycle = self.store.cycles_completed();
            debug!(cycle, cycle_length = tick.cycle_length, "cycle completed");
            metrics::record_cycle_completed();
            self.events.emit(Event::CycleCompleted {
                timestamp: Utc::now(),
                cycle,
                cycle_length: tick.cycle_length,
            });
        }

        if let Some(schedule) = tick.adopted {
            info!(
                cycle_length = tick.cycle_length,
                total_green = schedule.total_green(),
                "adopted pending schedule at cycle boundary"
            );
            metrics::record_schedule_adopted();
            self.events.emit(Event::ScheduleAdopted {
                timestamp: Utc::now(),
                schedule,
                cycle_length: tick.cycle_length,
            });
        }

        metrics::set_active_direction(tick.state.active_direction);
        metrics::set_cycle_length(tick.cycle_length);
        trace!(
            direction = %tick.state.active_direction,
            phase = %tick.state.phase,
            remaining = tick.state.remaining,
            "tick"
        );
        tick
    }

    /// Cancels the background tick task.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for PhaseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseEngine")
            .field("tick_interval", &self.tick_interval)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{PhaseKind, SegmentTimes};
    use crate::schedule::{Direction, Schedule};

    fn engine() -> Arc<PhaseEngine> {
        let store = Arc::new(StateStore::new(
            Schedule::default(),
            SegmentTimes::default(),
            Instant::now(),
        ));
        Arc::new(PhaseEngine::new(
            store,
            Duration::from_millis(200),
            Arc::new(EventEmitter::noop()),
        ))
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_task_adopts_at_boundary() {
        let engine = engine();
        let handle = engine.start_timer_task();
        settle().await;

        let next = Schedule::uniform(20.0, 60.0);
        tokio::time::advance(Duration::from_secs(20)).await;
        settle().await;
        engine.store().stage(next);

        tokio::time::advance(Duration::from_secs(20)).await;
        settle().await;
        assert_eq!(engine.store().active_schedule(), Schedule::default());
        assert!(engine.store().snapshot(Instant::now()).using_pending);

        tokio::time::advance(Duration::from_secs(11)).await;
        settle().await;
        assert_eq!(engine.store().active_schedule(), next);
        assert_eq!(engine.store().cycles_completed(), 1);

        engine.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn tick_once_reports_adoption() {
        let engine = engine();
        let start = Instant::now();
        engine.store().stage(Schedule::uniform(15.0, 45.0));

        let mid = engine.tick_once(start + Duration::from_secs(3));
        assert!(mid.adopted.is_none());
        assert_eq!(mid.state.phase, PhaseKind::Green);
        assert_eq!(mid.state.active_direction, Direction::North);

        let boundary = engine.tick_once(start + Duration::from_secs(50));
        assert!(boundary.wrapped);
        assert_eq!(boundary.adopted, Some(Schedule::uniform(15.0, 45.0)));
    }

    #[tokio::test]
    async fn shutdown_stops_timer_task() {
        let engine = engine();
        let handle = engine.start_timer_task();
        engine.shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("tick task should stop after shutdown")
            .unwrap();
    }
}
