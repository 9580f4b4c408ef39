//! Error types for `sigma`.
//!
//! The core components never surface errors to their callers: serial
//! failures become status values, malformed lines are dropped and the
//! allocator clamps. What remains here covers process setup and the
//! command-line surface.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `sigma` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Serial link error
    pub const SERIAL_ERROR: i32 = 4;

    /// HTTP surface error (bind failure)
    pub const API_ERROR: i32 = 5;

    /// Usage error (invalid arguments)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `sigma` operations.
#[derive(Debug, Error)]
pub enum SigmaError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Serial link error
    #[error(transparent)]
    Serial(#[from] SerialError),

    /// HTTP surface error
    #[error(transparent)]
    Api(#[from] ApiError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SigmaError {
    /// Returns the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Serial(_) => ExitCode::SERIAL_ERROR,
            Self::Api(_) => ExitCode::API_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Json(_) => ExitCode::ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// Validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set ({location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Message attached to the reference
        location: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Dotted path to the problematic field (e.g. `"allocator.min_green"`)
    pub path: String,
    /// Description of the issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the configuration from being used
    Error,
    /// Reported but does not prevent loading
    Warning,
}

// ============================================================================
// Serial Errors
// ============================================================================

/// Serial link errors.
///
/// These never leave the serial bridge as `Err`; they are logged and turned
/// into status values.
#[derive(Debug, Error)]
pub enum SerialError {
    /// The port could not be opened
    #[error("cannot open {port}: {reason}")]
    OpenFailed {
        /// Device path
        port: String,
        /// Reason reported by the driver
        reason: String,
    },

    /// I/O failure on an open link
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device closed the link
    #[error("serial link closed")]
    Closed,

    /// A write did not complete in time
    #[error("serial write timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Serial is disabled in configuration
    #[error("serial link disabled")]
    Disabled,
}

// ============================================================================
// API Errors
// ============================================================================

/// HTTP surface errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The bind address could not be parsed
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),

    /// A submitted schedule has a non-finite or negative field
    #[error("invalid schedule: {field} must be finite and non-negative")]
    InvalidSchedule {
        /// Offending field, e.g. `"south.green"`
        field: String,
    },

    /// A score submission could not be interpreted
    #[error("invalid scores: {0}")]
    InvalidScores(String),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `sigma` operations.
pub type Result<T> = std::result::Result<T, SigmaError>;
