//! Cycle timeline construction.
//!
//! A [`Timeline`] is one full rotation: for each direction, in rotation
//! order, all-red then yellow then green then all-red. Building it is pure;
//! the same schedule and segment times always give the same timeline.

use serde::{Deserialize, Serialize};

use crate::config::schema::EngineConfig;
use crate::schedule::{Direction, Schedule};

/// Segments emitted per direction.
pub const SEGMENTS_PER_DIRECTION: usize = 4;

/// Segments in a full timeline.
pub const TIMELINE_LEN: usize = SEGMENTS_PER_DIRECTION * Direction::ALL.len();

/// Signal state of the active direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// Every approach held at red.
    AllRed,
    /// Active approach showing yellow.
    Yellow,
    /// Active approach showing green.
    Green,
}

impl PhaseKind {
    /// Name used in logs and JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllRed => "all_red",
            Self::Yellow => "yellow",
            Self::Green => "green",
        }
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timed step of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseSegment {
    /// Direction this segment belongs to.
    pub direction: Direction,
    /// Signal state during the segment.
    pub kind: PhaseKind,
    /// Length in seconds, never negative.
    pub duration: f64,
}

/// Fixed lengths of the non-green segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentTimes {
    /// Yellow length, seconds.
    pub yellow: f64,
    /// Length of each all-red segment, seconds.
    pub all_red: f64,
}

impl SegmentTimes {
    /// Fixed overhead of one cycle, independent of any green.
    #[must_use]
    pub fn overhead(&self) -> f64 {
        Direction::ALL.len() as f64 * (self.yellow + 2.0 * self.all_red)
    }
}

impl Default for SegmentTimes {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for SegmentTimes {
    fn from(config: &EngineConfig) -> Self {
        Self {
            yellow: non_negative(config.yellow_secs),
            all_red: non_negative(config.all_red_secs),
        }
    }
}

/// Where a point in the cycle falls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Index of the active segment.
    pub index: usize,
    /// Cycle offset at which the segment started.
    pub start: f64,
    /// Cycle offset at which the segment ends.
    pub end: f64,
}

/// Ordered segments of one full rotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    segments: Vec<PhaseSegment>,
}

impl Timeline {
    /// Builds the timeline for `schedule`.
    ///
    /// Non-finite or negative greens become zero-length green segments, so a
    /// malformed schedule still yields a valid (all clearance) cycle.
    #[must_use]
    pub fn build(schedule: &Schedule, times: SegmentTimes) -> Self {
        let mut segments = Vec::with_capacity(TIMELINE_LEN);
        for direction in Direction::ALL {
            let green = non_negative(schedule.green(direction));
            segments.extend([
                PhaseSegment {
                    direction,
                    kind: PhaseKind::AllRed,
                    duration: times.all_red,
                },
                PhaseSegment {
                    direction,
                    kind: PhaseKind::Yellow,
                    duration: times.yellow,
                },
                PhaseSegment {
                    direction,
                    kind: PhaseKind::Green,
                    duration: green,
                },
                PhaseSegment {
                    direction,
                    kind: PhaseKind::AllRed,
                    duration: times.all_red,
                },
            ]);
        }
        Self { segments }
    }

    /// Segments in cycle order.
    #[must_use]
    pub fn segments(&self) -> &[PhaseSegment] {
        &self.segments
    }

    /// Sum of all segment durations.
    #[must_use]
    pub fn cycle_length(&self) -> f64 {
        self.segments.iter().map(|s| s.duration).sum()
    }

    /// Finds the segment active `elapsed` seconds into the cycle: the first
    /// whose cumulative end exceeds `elapsed`.
    ///
    /// Past the end of the cycle this reports the final segment with no
    /// time remaining.
    #[must_use]
    pub fn locate(&self, elapsed: f64) -> Position {
        let mut start = 0.0;
        for (index, segment) in self.segments.iter().enumerate() {
            let end = start + segment.duration;
            if end > elapsed {
                return Position { index, start, end };
            }
            start = end;
        }
        let index = self.segments.len() - 1;
        Position {
            index,
            start: start - self.segments[index].duration,
            end: start,
        }
    }

    /// Seconds from now until `target`'s green segment begins, given that
    /// segment `current` has `remaining` seconds left.
    ///
    /// Walks forward from the segment after `current` and wraps at most once.
    /// Every direction owns exactly one green segment per timeline, so the
    /// walk always finds it within one pass.
    #[must_use]
    pub fn time_until_green(&self, current: usize, remaining: f64, target: Direction) -> f64 {
        let len = self.segments.len();
        let mut t = remaining;
        for index in (current + 1..len).chain(0..len) {
            let segment = &self.segments[index];
            if segment.direction == target && segment.kind == PhaseKind::Green {
                return t;
            }
            t += segment.duration;
        }
        t
    }
}

/// Cycle length for `schedule` without keeping the timeline around.
#[must_use]
pub fn cycle_length(schedule: &Schedule, times: SegmentTimes) -> f64 {
    Timeline::build(schedule, times).cycle_length()
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}
