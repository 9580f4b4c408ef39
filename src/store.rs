//! Shared controller state.
//!
//! One [`StateStore`] is created at startup and shared by the phase engine,
//! the serial reader and the HTTP surface. It guards the active and pending
//! schedules, the latest derived [`EngineState`] and the latest device
//! reports behind a single lock. No I/O happens while the lock is held.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::time::Instant;

use crate::phase::{CycleState, EngineState, PhaseKind, SegmentTimes, Tick};
use crate::schedule::{Direction, PerDirection, Schedule};
use crate::serial::protocol::{InboundLine, RtReport};

/// A value with the instant it was received.
#[derive(Debug, Clone)]
struct Stamped<T> {
    value: T,
    at: Instant,
}

impl<T> Stamped<T> {
    fn age_ms(&self, now: Instant) -> u64 {
        u64::try_from(now.saturating_duration_since(self.at).as_millis()).unwrap_or(u64::MAX)
    }
}

#[derive(Debug)]
struct Shared {
    cycle: CycleState,
    live: EngineState,
    last_allocation: Option<Schedule>,
    rt: Option<Stamped<RtReport>>,
    sched: Option<Stamped<Schedule>>,
}

/// Guarded state shared between the engine, serial reader and API.
#[derive(Debug)]
pub struct StateStore {
    inner: Mutex<Shared>,
    default_schedule: Schedule,
}

/// Red figures for one snapshot.
///
/// `live` is the cycle-position countdown to each direction's next green;
/// `reported` is the allocation-time figure carried in the schedule. They
/// are computed differently and are reported side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedView {
    /// Seconds until each direction's own green begins.
    pub live: PerDirection<u32>,
    /// Red seconds from the active schedule.
    pub reported: PerDirection<f64>,
}

/// Read-only view of the engine for the API layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Direction whose segment is running.
    pub active_direction: Direction,
    /// Signal state of that segment.
    pub phase: PhaseKind,
    /// Whole seconds left in the segment.
    pub remaining: u32,
    /// Green countdown per direction.
    pub green: PerDirection<u32>,
    /// Live and reported red figures.
    pub red: RedView,
    /// Whether a staged schedule is waiting for the next boundary.
    pub using_pending: bool,
    /// Schedule driving the current cycle.
    pub schedule: Schedule,
    /// Schedule waiting for the next boundary.
    pub pending: Option<Schedule>,
    /// Length of the current cycle in seconds.
    pub cycle_length: f64,
    /// Completed cycles since startup.
    pub cycles_completed: u64,
    /// Milliseconds since the last `RT` line, if any arrived.
    pub rt_age_ms: Option<u64>,
    /// Milliseconds since the last `SCHED` line, if any arrived.
    pub sched_age_ms: Option<u64>,
}

/// Where a [`DeviceView`] schedule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleSource {
    /// Echoed by the device in a `SCHED` line.
    Device,
    /// No echo yet; the configured default.
    Default,
}

/// What the device last told us.
///
/// `live` is `None` until the first `RT` line arrives; the view never fails
/// for lack of data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceView {
    /// Latest live report, if any.
    pub live: Option<RtReport>,
    /// Device-echoed schedule, or the default.
    pub schedule: Schedule,
    /// Origin of `schedule`.
    pub schedule_source: ScheduleSource,
    /// Milliseconds since `live` was received.
    pub age_ms: Option<u64>,
}

impl StateStore {
    /// Creates the store with a cycle starting at `now` under
    /// `default_schedule`.
    #[must_use]
    pub fn new(default_schedule: Schedule, times: SegmentTimes, now: Instant) -> Self {
        let mut cycle = CycleState::new(default_schedule, times, now);
        let live = cycle.tick(now).state;
        Self {
            inner: Mutex::new(Shared {
                cycle,
                live,
                last_allocation: None,
                rt: None,
                sched: None,
            }),
            default_schedule,
        }
    }

    // A panic while holding the lock leaves plain data behind; keep serving it.
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Advances the cycle to `now` and stores the derived state.
    pub fn tick(&self, now: Instant) -> Tick {
        let mut shared = self.lock();
        let tick = shared.cycle.tick(now);
        shared.live = tick.state.clone();
        tick
    }

    /// Stages `schedule` for the next cycle boundary. Returns whether an
    /// unadopted schedule was replaced.
    pub fn stage(&self, schedule: Schedule) -> bool {
        let mut shared = self.lock();
        let superseded = shared.cycle.stage(schedule).is_some();
        shared.live.using_pending = true;
        superseded
    }

    /// Records `schedule` as the latest allocation and stages it.
    pub fn stage_allocation(&self, schedule: Schedule) -> bool {
        let mut shared = self.lock();
        shared.last_allocation = Some(schedule);
        let superseded = shared.cycle.stage(schedule).is_some();
        shared.live.using_pending = true;
        superseded
    }

    /// Caches a classified device line received at `now`.
    pub fn record_report(&self, line: InboundLine, now: Instant) {
        let mut shared = self.lock();
        match line {
            InboundLine::Realtime(report) => {
                shared.rt = Some(Stamped {
                    value: report,
                    at: now,
                });
            }
            InboundLine::Schedule(schedule) => {
                shared.sched = Some(Stamped {
                    value: schedule,
                    at: now,
                });
            }
        }
    }

    /// Engine view as of the last tick.
    #[must_use]
    pub fn snapshot(&self, now: Instant) -> Snapshot {
        let shared = self.lock();
        let schedule = *shared.cycle.active();
        let live = &shared.live;
        Snapshot {
            active_direction: live.active_direction,
            phase: live.phase,
            remaining: live.remaining,
            green: live.green_countdown,
            red: RedView {
                live: live.red_countdown,
                reported: schedule.0.map(|_, t| t.red),
            },
            using_pending: live.using_pending,
            schedule,
            pending: shared.cycle.pending().copied(),
            cycle_length: shared.cycle.timeline().cycle_length(),
            cycles_completed: shared.cycle.cycles_completed(),
            rt_age_ms: shared.rt.as_ref().map(|r| r.age_ms(now)),
            sched_age_ms: shared.sched.as_ref().map(|s| s.age_ms(now)),
        }
    }

    /// Device-reported view.
    #[must_use]
    pub fn device_view(&self, now: Instant) -> DeviceView {
        let shared = self.lock();
        let (schedule, schedule_source) = shared.sched.as_ref().map_or(
            (self.default_schedule, ScheduleSource::Default),
            |s| (s.value, ScheduleSource::Device),
        );
        DeviceView {
            live: shared.rt.as_ref().map(|r| r.value.clone()),
            schedule,
            schedule_source,
            age_ms: shared.rt.as_ref().map(|r| r.age_ms(now)),
        }
    }

    /// Latest allocation, or the default schedule before the first one.
    #[must_use]
    pub fn last_allocation(&self) -> Schedule {
        self.lock().last_allocation.unwrap_or(self.default_schedule)
    }

    /// Schedule driving the current cycle.
    #[must_use]
    pub fn active_schedule(&self) -> Schedule {
        *self.lock().cycle.active()
    }

    /// Schedule waiting for the next boundary.
    #[must_use]
    pub fn pending_schedule(&self) -> Option<Schedule> {
        self.lock().cycle.pending().copied()
    }

    /// Completed cycles since startup.
    #[must_use]
    pub fn cycles_completed(&self) -> u64 {
        self.lock().cycle.cycles_completed()
    }

    /// Schedule used at startup and as the device fallback.
    #[must_use]
    pub const fn default_schedule(&self) -> Schedule {
        self.default_schedule
    }
}
