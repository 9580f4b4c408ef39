//! `sigma` - adaptive traffic-signal phase scheduler

use clap::Parser;
use tokio_util::sync::CancellationToken;

use sigma::cli::args::Cli;
use sigma::cli::commands;
use sigma::error::ExitCode;
use sigma::observability::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(cli.log_format, cli.verbose, cli.color);
    }

    let cancel = CancellationToken::new();
    tokio::spawn(watch_signals(cancel.clone()));

    match commands::dispatch(cli, cancel).await {
        Ok(()) => std::process::exit(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

/// First Ctrl+C or SIGTERM cancels `cancel`; a second one exits at once.
async fn watch_signals(cancel: CancellationToken) {
    next_signal().await;
    eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
    cancel.cancel();

    std::process::exit(next_signal().await);
}

/// Waits for the next termination signal and returns its exit code.
#[cfg(unix)]
async fn next_signal() -> i32 {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => tokio::select! {
            _ = tokio::signal::ctrl_c() => ExitCode::INTERRUPTED,
            _ = sigterm.recv() => ExitCode::TERMINATED,
        },
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, Ctrl+C only");
            let _ = tokio::signal::ctrl_c().await;
            ExitCode::INTERRUPTED
        }
    }
}

#[cfg(not(unix))]
async fn next_signal() -> i32 {
    let _ = tokio::signal::ctrl_c().await;
    ExitCode::INTERRUPTED
}
