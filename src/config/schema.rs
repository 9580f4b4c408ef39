//! Configuration schema types.
//!
//! Every section and field has a default, so an empty document (or no
//! document at all) yields a runnable configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::schedule::Schedule;

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration for a `sigma` controller process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SigmaConfig {
    /// Serial link to the physical signal controller.
    pub serial: SerialConfig,

    /// Phase engine timing.
    pub engine: EngineConfig,

    /// Fuzzy allocator parameters.
    pub allocator: AllocatorConfig,

    /// HTTP surface.
    pub api: ApiConfig,

    /// Schedule active at startup and reported when the device has not
    /// echoed one yet.
    pub default_schedule: DefaultSchedule,
}

// ============================================================================
// Serial
// ============================================================================

/// Serial link settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialConfig {
    /// Whether to talk to a device at all. When false the engine runs in
    /// software only and every transmit reports failure.
    pub enabled: bool,

    /// Device path, e.g. `/dev/ttyACM0` or `COM9`.
    pub port: String,

    /// Baud rate.
    pub baud: u32,

    /// Wait after opening before first use, covering device boot.
    #[serde(with = "humantime_str")]
    pub settle_delay: Duration,

    /// Upper bound on a single blocking read.
    #[serde(with = "humantime_str")]
    pub read_timeout: Duration,

    /// Pause after an empty read before trying again.
    #[serde(with = "humantime_str")]
    pub idle_backoff: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: "/dev/ttyACM0".to_string(),
            baud: 115_200,
            settle_delay: Duration::from_secs(2),
            read_timeout: Duration::from_secs(1),
            idle_backoff: Duration::from_millis(50),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Phase engine timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Interval between engine ticks.
    #[serde(with = "humantime_str")]
    pub tick: Duration,

    /// Yellow segment length, seconds.
    pub yellow_secs: f64,

    /// Length of each all-red segment, seconds. Every direction has two.
    pub all_red_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
            yellow_secs: 1.5,
            all_red_secs: 0.5,
        }
    }
}

// ============================================================================
// Allocator
// ============================================================================

/// Fuzzy allocator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocatorConfig {
    /// Lower green bound, seconds.
    pub min_green: f64,

    /// Upper green bound, seconds.
    pub max_green: f64,

    /// Green every direction gets before its share is added.
    pub base_green: f64,

    /// Green budget split by share.
    pub extra_green: f64,

    /// Floor applied to every defuzzified weight.
    pub min_weight: f64,

    /// Score substituted for directions with missing or invalid data.
    pub fallback_score: f64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            min_green: 15.0,
            max_green: 45.0,
            base_green: 10.0,
            extra_green: 40.0,
            min_weight: 0.1,
            fallback_score: 0.0,
        }
    }
}

impl AllocatorConfig {
    /// Returns `score` when it is a usable congestion value, otherwise the
    /// fallback. Missing, negative and non-finite scores are unusable.
    #[must_use]
    pub fn score_or_fallback(&self, score: Option<f64>) -> f64 {
        match score {
            Some(s) if s.is_finite() && s >= 0.0 => s,
            _ => self.fallback_score,
        }
    }
}

// ============================================================================
// API
// ============================================================================

/// HTTP surface settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Bind address, `[host:]port`.
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

// ============================================================================
// Default schedule
// ============================================================================

/// Uniform timing used before the first allocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultSchedule {
    /// Green seconds per direction.
    pub green: f64,

    /// Red seconds per direction.
    pub red: f64,
}

impl Default for DefaultSchedule {
    fn default() -> Self {
        Self {
            green: Schedule::DEFAULT_GREEN,
            red: Schedule::DEFAULT_RED,
        }
    }
}

impl DefaultSchedule {
    /// Expands into a full schedule.
    #[must_use]
    pub fn to_schedule(self) -> Schedule {
        Schedule::uniform(self.green, self.red)
    }
}

/// Serde adapter for human-readable durations such as `"200ms"` or `"2s"`.
mod humantime_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}
