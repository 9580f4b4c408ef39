//! CLI command dispatch and handlers.
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod allocate;
pub mod completions;
pub mod run;
pub mod validate;
pub mod version;

use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands};
use crate::config::{ConfigLoader, SigmaConfig};
use crate::error::SigmaError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), SigmaError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cancel).await,
        Commands::Allocate(args) => allocate::run(&args),
        Commands::Validate(args) => validate::run(&args),
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

/// Loads `path`, or the built-in defaults when no file is given. Loader
/// warnings are logged.
pub(crate) fn load_config(path: Option<&Path>) -> Result<SigmaConfig, SigmaError> {
    let Some(path) = path else {
        tracing::info!("no configuration file, using defaults");
        return Ok(SigmaConfig::default());
    };

    tracing::info!(config = %path.display(), "loading configuration");
    let result = ConfigLoader::default().load(path)?;
    for warning in &result.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    Ok(result.config)
}
