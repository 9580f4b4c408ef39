//! Logging setup.
//!
//! Everything goes to stderr through `tracing`. Verbosity raises this
//! crate's own level first; the HTTP and serial stacks stay one level
//! quieter so `-vv` shows engine ticks without hyper internals.
//! `SIGMA_LOG_LEVEL` replaces the computed filter entirely.

use std::io::IsTerminal;

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable holding a full `EnvFilter` directive.
pub const LOG_LEVEL_ENV: &str = "SIGMA_LOG_LEVEL";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Text lines, colored on a terminal.
    #[default]
    Human,
    /// One flat JSON object per event, for log shippers.
    Json,
}

/// Filter directive for `-v` count `verbosity`.
#[must_use]
pub fn default_directive(verbosity: u8) -> String {
    let crate_name = env!("CARGO_CRATE_NAME");
    match verbosity {
        0 => "warn".to_string(),
        1 => format!("warn,{crate_name}=info"),
        2 => format!("info,{crate_name}=debug"),
        _ => format!("debug,{crate_name}=trace"),
    }
}

fn ansi_enabled(color: ColorChoice, stderr_is_tty: bool, no_color: bool) -> bool {
    match color {
        ColorChoice::Auto => stderr_is_tty && !no_color,
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    }
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    let show_target = verbosity >= 2;

    let installed = match format {
        LogFormat::Human => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(ansi_enabled(
                color,
                std::io::stderr().is_terminal(),
                std::env::var_os("NO_COLOR").is_some(),
            ))
            .with_target(show_target)
            .with_writer(std::io::stderr)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_target(show_target)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_by_default() {
        assert_eq!(default_directive(0), "warn");
        assert_eq!(LogFormat::default(), LogFormat::Human);
    }

    #[test]
    fn verbosity_raises_own_crate_first() {
        assert_eq!(default_directive(1), "warn,sigma=info");
        assert_eq!(default_directive(2), "info,sigma=debug");
        assert_eq!(default_directive(3), "debug,sigma=trace");
        assert_eq!(default_directive(u8::MAX), default_directive(3));
    }

    #[test]
    fn directives_parse() {
        for v in 0..4 {
            assert!(EnvFilter::try_new(default_directive(v)).is_ok());
        }
    }

    #[test]
    fn auto_color_needs_tty_and_no_override() {
        assert!(ansi_enabled(ColorChoice::Auto, true, false));
        assert!(!ansi_enabled(ColorChoice::Auto, true, true));
        assert!(!ansi_enabled(ColorChoice::Auto, false, false));
        assert!(ansi_enabled(ColorChoice::Always, false, true));
        assert!(!ansi_enabled(ColorChoice::Never, true, false));
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_logging(LogFormat::Human, 0, ColorChoice::Auto);
        init_logging(LogFormat::Json, 3, ColorChoice::Never);
    }
}
