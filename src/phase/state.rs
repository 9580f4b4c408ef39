//! Cycle state and the derived per-tick engine state.
//!
//! [`CycleState`] owns the cycle start time, the active schedule and the
//! single pending slot. [`EngineState`] is recomputed from it on every tick
//! and never mutated on its own.

use serde::Serialize;
use tokio::time::Instant;

use crate::schedule::{Direction, PerDirection, Schedule};

use super::timeline::{PhaseKind, SegmentTimes, Timeline};

/// Live signal state derived from the cycle position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineState {
    /// Direction whose segment is running.
    pub active_direction: Direction,
    /// Signal state of that segment.
    pub phase: PhaseKind,
    /// Whole seconds left in the segment.
    pub remaining: u32,
    /// Green seconds left; non-zero only for the active direction while green.
    pub green_countdown: PerDirection<u32>,
    /// Seconds until each direction's own green begins.
    pub red_countdown: PerDirection<u32>,
    /// Whether a staged schedule is waiting for the next cycle boundary.
    pub using_pending: bool,
}

impl EngineState {
    /// Derives the state `elapsed` seconds into `timeline`.
    #[must_use]
    pub fn compute(timeline: &Timeline, elapsed: f64, using_pending: bool) -> Self {
        let position = timeline.locate(elapsed);
        let segment = timeline.segments()[position.index];
        let remaining = (position.end - elapsed).max(0.0);
        let remaining_secs = round_secs(remaining);

        let mut green_countdown = PerDirection::splat(0);
        if segment.kind == PhaseKind::Green {
            green_countdown[segment.direction] = remaining_secs;
        }

        let red_countdown = PerDirection::from_fn(|target| {
            if segment.kind == PhaseKind::Green && target == segment.direction {
                0
            } else {
                // A direction that is not green is always at least a second
                // away from it once rounded.
                round_secs(timeline.time_until_green(position.index, remaining, target)).max(1)
            }
        });

        Self {
            active_direction: segment.direction,
            phase: segment.kind,
            remaining: remaining_secs,
            green_countdown,
            red_countdown,
            using_pending,
        }
    }
}

/// Outcome of one [`CycleState::tick`].
#[derive(Debug, Clone)]
pub struct Tick {
    /// State derived at this tick.
    pub state: EngineState,
    /// Whether this tick crossed a cycle boundary.
    pub wrapped: bool,
    /// Schedule adopted at this boundary, if one was pending.
    pub adopted: Option<Schedule>,
    /// Seconds into the current cycle.
    pub elapsed: f64,
    /// Length of the current cycle.
    pub cycle_length: f64,
}

/// Cycle bookkeeping guarded by the state lock.
///
/// The active schedule only changes inside [`tick`](Self::tick) at a cycle
/// boundary, so a running green or yellow is never cut short.
#[derive(Debug, Clone)]
pub struct CycleState {
    started_at: Instant,
    active: Schedule,
    pending: Option<Schedule>,
    timeline: Timeline,
    times: SegmentTimes,
    cycles_completed: u64,
}

impl CycleState {
    /// Starts a cycle at `now` running `schedule`.
    #[must_use]
    pub fn new(schedule: Schedule, times: SegmentTimes, now: Instant) -> Self {
        Self {
            started_at: now,
            timeline: Timeline::build(&schedule, times),
            active: schedule,
            pending: None,
            times,
            cycles_completed: 0,
        }
    }

    /// Stages `schedule` for the next cycle boundary.
    ///
    /// At most one change is outstanding; a newer schedule supersedes an
    /// older one that has not been adopted yet. Returns the superseded
    /// schedule, if any.
    pub fn stage(&mut self, schedule: Schedule) -> Option<Schedule> {
        self.pending.replace(schedule)
    }

    /// Advances to `now`.
    ///
    /// When the elapsed time reaches the cycle length the cycle restarts at
    /// `now` and any pending schedule becomes active. A zero-length cycle
    /// wraps on every tick.
    pub fn tick(&mut self, now: Instant) -> Tick {
        let mut total = self.timeline.cycle_length();
        let mut elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let mut wrapped = false;
        let mut adopted = None;

        if total <= 0.0 || elapsed >= total {
            self.started_at = now;
            elapsed = 0.0;
            wrapped = true;
            self.cycles_completed = self.cycles_completed.saturating_add(1);
            if let Some(next) = self.pending.take() {
                self.active = next;
                self.timeline = Timeline::build(&next, self.times);
                total = self.timeline.cycle_length();
                adopted = Some(next);
            }
        }

        Tick {
            state: EngineState::compute(&self.timeline, elapsed, self.pending.is_some()),
            wrapped,
            adopted,
            elapsed,
            cycle_length: total,
        }
    }

    /// Schedule driving the current cycle.
    #[must_use]
    pub const fn active(&self) -> &Schedule {
        &self.active
    }

    /// Schedule waiting for the next boundary.
    #[must_use]
    pub const fn pending(&self) -> Option<&Schedule> {
        self.pending.as_ref()
    }

    /// Timeline of the current cycle.
    #[must_use]
    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// When the current cycle began.
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Number of completed cycles.
    #[must_use]
    pub const fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_secs(seconds: f64) -> u32 {
    seconds.round().clamp(0.0, f64::from(u32::MAX)) as u32
}
