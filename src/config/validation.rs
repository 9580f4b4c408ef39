//! Configuration validation.
//!
//! Runs on the fully deserialized [`SigmaConfig`] and collects every issue
//! rather than stopping at the first one.

use crate::api::parse_bind_addr;
use crate::config::schema::SigmaConfig;
use crate::error::{Severity, ValidationIssue};
use crate::phase::SegmentTimes;

/// Fixed per-cycle clearance the controller is calibrated for.
const NOMINAL_OVERHEAD_SECS: f64 = 10.0;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every issue found.
    pub fn validate(&mut self, config: &SigmaConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_serial(config);
        self.validate_engine(config);
        self.validate_allocator(config);
        self.validate_api(config);
        self.validate_default_schedule(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    fn validate_serial(&mut self, config: &SigmaConfig) {
        let serial = &config.serial;
        if !serial.enabled {
            return;
        }
        if serial.port.trim().is_empty() {
            self.add_error("serial.port", "port is required while serial is enabled");
        }
        if serial.baud == 0 {
            self.add_error("serial.baud", "baud rate must be positive");
        }
        if serial.read_timeout.is_zero() {
            self.add_error("serial.read_timeout", "read timeout must be positive");
        }
        if serial.idle_backoff.is_zero() {
            self.add_warning(
                "serial.idle_backoff",
                "zero backoff makes the reader spin on an idle link",
            );
        }
    }

    fn validate_engine(&mut self, config: &SigmaConfig) {
        let engine = &config.engine;
        if engine.tick.is_zero() {
            self.add_error("engine.tick", "tick interval must be positive");
        } else if engine.tick.as_secs_f64() > 1.0 {
            self.add_warning(
                "engine.tick",
                "tick interval above 1s makes countdowns skip seconds",
            );
        }

        self.non_negative("engine.yellow_secs", engine.yellow_secs);
        self.non_negative("engine.all_red_secs", engine.all_red_secs);

        let overhead = SegmentTimes::from(engine).overhead();
        if overhead <= 0.0 {
            // With no clearance an all-zero-green schedule has no cycle.
            self.add_error(
                "engine",
                "yellow_secs and all_red_secs must not both be zero",
            );
        } else if (overhead - NOMINAL_OVERHEAD_SECS).abs() > 1e-9 {
            self.add_warning(
                "engine",
                &format!(
                    "cycle overhead is {overhead}s; the device firmware assumes {NOMINAL_OVERHEAD_SECS}s"
                ),
            );
        }
    }

    fn validate_allocator(&mut self, config: &SigmaConfig) {
        let alloc = &config.allocator;
        self.non_negative("allocator.min_green", alloc.min_green);
        self.non_negative("allocator.max_green", alloc.max_green);
        self.non_negative("allocator.base_green", alloc.base_green);
        self.non_negative("allocator.extra_green", alloc.extra_green);
        self.non_negative("allocator.fallback_score", alloc.fallback_score);

        if alloc.min_green > alloc.max_green {
            self.add_error("allocator.min_green", "min_green must not exceed max_green");
        }
        if !(alloc.min_weight.is_finite() && alloc.min_weight > 0.0) {
            self.add_error("allocator.min_weight", "min_weight must be positive");
        }
        if alloc.base_green + alloc.extra_green < alloc.min_green {
            self.add_warning(
                "allocator.extra_green",
                "base_green + extra_green is below min_green; every direction will be clamped",
            );
        }
    }

    fn validate_api(&mut self, config: &SigmaConfig) {
        if let Err(e) = parse_bind_addr(&config.api.bind) {
            self.add_error("api.bind", &e.to_string());
        }
    }

    fn validate_default_schedule(&mut self, config: &SigmaConfig) {
        let schedule = &config.default_schedule;
        self.non_negative("default_schedule.green", schedule.green);
        self.non_negative("default_schedule.red", schedule.red);
        if schedule.green.abs() < f64::EPSILON {
            self.add_warning(
                "default_schedule.green",
                "zero default green runs clearance-only cycles until the first allocation",
            );
        }
    }

    fn non_negative(&mut self, path: &str, value: f64) {
        if !(value.is_finite() && value >= 0.0) {
            self.add_error(path, "must be a finite, non-negative number");
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn validate(config: &SigmaConfig) -> ValidationResult {
        Validator::new().validate(config)
    }

    #[test]
    fn default_config_is_valid_without_warnings() {
        let result = validate(&SigmaConfig::default());
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn inverted_green_bounds_are_an_error() {
        let mut config = SigmaConfig::default();
        config.allocator.min_green = 50.0;
        let result = validate(&config);
        assert!(result.has_errors());
        assert!(result.errors.iter().any(|e| e.path == "allocator.min_green"));
    }

    #[test]
    fn collects_every_error() {
        let mut config = SigmaConfig::default();
        config.serial.port = String::new();
        config.serial.baud = 0;
        config.engine.tick = Duration::ZERO;
        config.allocator.min_weight = 0.0;
        config.api.bind = "not an address".to_string();
        let result = validate(&config);
        let paths: Vec<&str> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "serial.port",
                "serial.baud",
                "engine.tick",
                "allocator.min_weight",
                "api.bind"
            ]
        );
    }

    #[test]
    fn disabled_serial_skips_port_checks() {
        let mut config = SigmaConfig::default();
        config.serial.enabled = false;
        config.serial.port = String::new();
        assert!(validate(&config).is_valid());
    }

    #[test]
    fn non_nominal_overhead_warns() {
        let mut config = SigmaConfig::default();
        config.engine.yellow_secs = 3.0;
        let result = validate(&config);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.path == "engine"));
    }

    #[test]
    fn zero_clearance_is_an_error() {
        let mut config = SigmaConfig::default();
        config.engine.yellow_secs = 0.0;
        config.engine.all_red_secs = 0.0;
        let result = validate(&config);
        assert!(result.errors.iter().any(|e| e.path == "engine"));
        assert!(!result.warnings.iter().any(|w| w.path == "engine"));
    }

    #[test]
    fn nan_timing_is_an_error() {
        let mut config = SigmaConfig::default();
        config.engine.all_red_secs = f64::NAN;
        let result = validate(&config);
        assert!(result.errors.iter().any(|e| e.path == "engine.all_red_secs"));
    }
}
