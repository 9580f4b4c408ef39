//! CLI argument definitions.
//!
//! All clap derive structs for `sigma` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Adaptive traffic-signal scheduler for a serial-attached controller.
#[derive(Parser, Debug)]
#[command(name = "sigma", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "SIGMA_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "SIGMA_LOG_FORMAT")]
    pub log_format: LogFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the phase engine, serial link and HTTP API.
    Run(RunArgs),

    /// Allocate green time once from congestion scores and print it.
    Allocate(AllocateArgs),

    /// Validate configuration files without starting anything.
    Validate(ValidateArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

// ============================================================================
// Run
// ============================================================================

/// Arguments for `run`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Path to YAML configuration file.
    #[arg(short, long, env = "SIGMA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Serial device path, overriding `serial.port`.
    #[arg(long, env = "SIGMA_SERIAL_PORT")]
    pub port: Option<String>,

    /// Serial baud rate, overriding `serial.baud`.
    #[arg(long, env = "SIGMA_SERIAL_BAUD")]
    pub baud: Option<u32>,

    /// HTTP bind address `[host:]port`, overriding `api.bind`.
    #[arg(long, env = "SIGMA_BIND")]
    pub bind: Option<String>,

    /// Run without a device; transmits report failure.
    #[arg(long)]
    pub no_serial: bool,

    /// Expose Prometheus metrics on 127.0.0.1 at this port.
    #[arg(long, env = "SIGMA_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Write JSONL engine events to this file instead of stderr.
    #[arg(long, env = "SIGMA_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,
}

// ============================================================================
// Allocate / Validate
// ============================================================================

/// Arguments for `allocate`.
#[derive(Args, Debug)]
pub struct AllocateArgs {
    /// North congestion score.
    #[arg(allow_negative_numbers = true)]
    pub north: f64,

    /// East congestion score.
    #[arg(allow_negative_numbers = true)]
    pub east: f64,

    /// South congestion score.
    #[arg(allow_negative_numbers = true)]
    pub south: f64,

    /// West congestion score.
    #[arg(allow_negative_numbers = true)]
    pub west: f64,

    /// Configuration file supplying allocator and engine parameters.
    #[arg(short, long, env = "SIGMA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Treat warnings as errors.
    #[arg(long)]
    pub strict: bool,
}

// ============================================================================
// Completions / Version
// ============================================================================

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

// ============================================================================
// Tests
// ============================================================================
