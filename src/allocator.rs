//! Fuzzy green-time allocation.
//!
//! Each direction's congestion score is fuzzified into low / medium / high
//! memberships, collapsed into a weight, and the weights are normalized into
//! a share of the extra green budget. The result is clamped into the
//! configured green bounds. Red for a direction is reported as the total
//! green of the other three.

use crate::config::schema::AllocatorConfig;
use crate::schedule::{PerDirection, Schedule};

/// Membership in the "low congestion" set.
#[must_use]
pub fn low(x: f64) -> f64 {
    if x <= 0.0 {
        1.0
    } else if x <= 15.0 {
        1.0 - x / 15.0
    } else if x <= 25.0 {
        ((25.0 - x) / 10.0).max(0.0)
    } else {
        0.0
    }
}

/// Membership in the "medium congestion" set.
#[must_use]
pub fn medium(x: f64) -> f64 {
    if x > 10.0 && x <= 20.0 {
        (x - 10.0) / 10.0
    } else if x > 20.0 && x <= 30.0 {
        (30.0 - x) / 10.0
    } else {
        0.0
    }
}

/// Membership in the "high congestion" set.
#[must_use]
pub fn high(x: f64) -> f64 {
    if x <= 20.0 {
        0.0
    } else if x <= 30.0 {
        (x - 20.0) / 10.0
    } else {
        1.0
    }
}

/// Converts congestion scores into a [`Schedule`].
///
/// Pure and deterministic: the same scores always yield the same schedule,
/// and no input makes it fail. Out-of-range greens are clamped.
#[derive(Debug, Clone)]
pub struct FuzzyAllocator {
    config: AllocatorConfig,
}

impl FuzzyAllocator {
    /// Creates an allocator with the given bounds and budget.
    #[must_use]
    pub const fn new(config: AllocatorConfig) -> Self {
        Self { config }
    }

    /// Returns the allocator parameters.
    #[must_use]
    pub const fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Defuzzified weight for a single score, floored at `min_weight`.
    #[must_use]
    pub fn weight(&self, score: f64) -> f64 {
        let w = 0.5 * low(score) + 1.0 * medium(score) + 1.5 * high(score);
        w.max(self.config.min_weight)
    }

    /// Per-direction weights for `scores`.
    #[must_use]
    pub fn weights(&self, scores: &PerDirection<f64>) -> PerDirection<f64> {
        scores.map(|_, &s| self.weight(s))
    }

    /// Per-direction share of the total weight; shares sum to one.
    #[must_use]
    pub fn shares(&self, scores: &PerDirection<f64>) -> PerDirection<f64> {
        let weights = self.weights(scores);
        let total: f64 = weights.iter().map(|(_, w)| *w).sum();
        weights.map(|_, &w| if total > 0.0 { w / total } else { 0.25 })
    }

    /// Allocates green time to every direction.
    #[must_use]
    pub fn allocate(&self, scores: &PerDirection<f64>) -> Schedule {
        let cfg = &self.config;
        let greens = self.shares(scores).map(|_, &share| {
            (cfg.base_green + share * cfg.extra_green)
                .max(cfg.min_green)
                .min(cfg.max_green)
        });
        Schedule::from_greens(&greens)
    }
}

impl Default for FuzzyAllocator {
    fn default() -> Self {
        Self::new(AllocatorConfig::default())
    }
}
