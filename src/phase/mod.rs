//! Phase engine
//!
//! Builds the cycle timeline from a schedule, derives live countdowns from
//! the cycle position, and swaps in staged schedules only at cycle
//! boundaries.

pub mod engine;
pub mod state;
pub mod timeline;

pub use engine::PhaseEngine;
pub use state::{CycleState, EngineState, Tick};
pub use timeline::{PhaseKind, PhaseSegment, Position, SegmentTimes, Timeline, cycle_length};
