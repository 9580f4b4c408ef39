//! Entry point for the detection side.
//!
//! Congestion scores come in, a schedule goes out: the [`Controller`]
//! allocates, stages the result for the next cycle boundary and transmits
//! it to the device. The engine picks it up on its own schedule.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::allocator::FuzzyAllocator;
use crate::error::ApiError;
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics;
use crate::phase::{SegmentTimes, cycle_length};
use crate::schedule::{PerDirection, Schedule};
use crate::serial::SerialBridge;
use crate::store::StateStore;

/// Scores as submitted; absent entries get the fallback score.
pub type ScoreInput = PerDirection<Option<f64>>;

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Schedule staged for the next cycle.
    pub schedule: Schedule,
    /// Cycle length the schedule will run at.
    pub cycle_length: f64,
    /// Whether the device accepted the write.
    pub serial_sent: bool,
    /// Whether an earlier unadopted schedule was replaced.
    pub superseded: bool,
}

/// Allocates, stages and transmits schedules.
#[derive(Debug)]
pub struct Controller {
    allocator: FuzzyAllocator,
    store: Arc<StateStore>,
    bridge: Arc<SerialBridge>,
    times: SegmentTimes,
    events: Arc<EventEmitter>,
}

impl Controller {
    /// Creates a controller.
    #[must_use]
    pub const fn new(
        allocator: FuzzyAllocator,
        store: Arc<StateStore>,
        bridge: Arc<SerialBridge>,
        times: SegmentTimes,
        events: Arc<EventEmitter>,
    ) -> Self {
        Self {
            allocator,
            store,
            bridge,
            times,
            events,
        }
    }

    /// Shared state.
    #[must_use]
    pub const fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Serial bridge.
    #[must_use]
    pub const fn bridge(&self) -> &Arc<SerialBridge> {
        &self.bridge
    }

    /// Replaces missing, negative and non-finite scores with the fallback.
    #[must_use]
    pub fn fill_scores(&self, input: &ScoreInput) -> PerDirection<f64> {
        let config = self.allocator.config();
        input.map(|_, &score| config.score_or_fallback(score))
    }

    /// Allocates from `input`, stages the result and transmits it.
    pub async fn submit_scores(&self, input: &ScoreInput) -> Allocation {
        let scores = self.fill_scores(input);
        let schedule = self.allocator.allocate(&scores);
        info!(
            north = scores.north,
            east = scores.east,
            south = scores.south,
            west = scores.west,
            "allocated schedule from congestion scores"
        );
        self.apply(schedule).await
    }

    /// Stages an explicit schedule and transmits it.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidSchedule` when a field is negative or not
    /// finite; nothing is staged in that case.
    pub async fn stage_schedule(&self, schedule: Schedule) -> Result<Allocation, ApiError> {
        if let Some(field) = schedule.first_invalid_field() {
            return Err(ApiError::InvalidSchedule { field });
        }
        Ok(self.apply(schedule).await)
    }

    async fn apply(&self, schedule: Schedule) -> Allocation {
        let superseded = self.store.stage_allocation(schedule);
        metrics::record_schedule_staged();
        self.events.emit(Event::ScheduleStaged {
            timestamp: Utc::now(),
            schedule,
            superseded,
        });
        if superseded {
            info!("staged schedule replaced an unadopted one");
        }

        let serial_sent = self.bridge.send_schedule(&schedule).await;
        Allocation {
            schedule,
            cycle_length: cycle_length(&schedule, self.times),
            serial_sent,
            superseded,
        }
    }
}
