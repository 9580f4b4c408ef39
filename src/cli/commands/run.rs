//! `run` command handler.
//!
//! Wires the state store, phase engine, serial reader and HTTP API
//! together and keeps them running until the cancellation token fires.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::allocator::FuzzyAllocator;
use crate::api;
use crate::cli::args::RunArgs;
use crate::config::ConfigOverrides;
use crate::controller::Controller;
use crate::error::SigmaError;
use crate::observability::EventEmitter;
use crate::phase::{PhaseEngine, SegmentTimes};
use crate::serial::{BridgeSettings, DisabledOpener, LinkOpener, SerialBridge, SerialPortOpener};
use crate::store::StateStore;

/// Start the controller.
///
/// # Errors
///
/// Returns a config error if the configuration cannot be loaded, an I/O
/// error if the events file cannot be created, or an API error if the
/// HTTP listener cannot bind.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), SigmaError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let loaded = super::load_config(args.config.as_deref())?;
    let config = ConfigOverrides {
        port: args.port.clone(),
        baud: args.baud,
        bind: args.bind.clone(),
        no_serial: args.no_serial,
    }
    .apply(loaded)?;

    let events = Arc::new(match args.events_file {
        Some(ref path) => EventEmitter::from_file(path)?,
        None => EventEmitter::stderr(),
    });

    let times = SegmentTimes::from(&config.engine);
    let store = Arc::new(StateStore::new(
        config.default_schedule.to_schedule(),
        times,
        Instant::now(),
    ));

    let opener: Box<dyn LinkOpener> = if config.serial.enabled {
        Box::new(SerialPortOpener::from(&config.serial))
    } else {
        tracing::warn!("serial link disabled, running in software only");
        Box::new(DisabledOpener::new(
            config.serial.port.clone(),
            config.serial.baud,
        ))
    };
    let bridge = Arc::new(SerialBridge::new(
        opener,
        BridgeSettings::from(&config.serial),
        Arc::clone(&events),
    ));

    let engine = Arc::new(PhaseEngine::new(
        Arc::clone(&store),
        config.engine.tick,
        Arc::clone(&events),
    ));
    let engine_task = engine.start_timer_task();

    let reader_task = config
        .serial
        .enabled
        .then(|| bridge.spawn_reader(Arc::clone(&store), cancel.clone()));

    let controller = Arc::new(Controller::new(
        FuzzyAllocator::new(config.allocator.clone()),
        store,
        bridge,
        times,
        events,
    ));

    let api_task = match api::serve(&config.api.bind, controller, cancel.clone()).await {
        Ok((task, addr)) => {
            tracing::info!(%addr, port = %config.serial.port, "sigma running");
            task
        }
        Err(e) => {
            cancel.cancel();
            engine.shutdown();
            let _ = engine_task.await;
            if let Some(task) = reader_task {
                let _ = task.await;
            }
            return Err(e.into());
        }
    };

    cancel.cancelled().await;
    tracing::info!("shutting down");

    engine.shutdown();
    let _ = engine_task.await;
    if let Some(task) = reader_task {
        let _ = task.await;
    }
    let _ = api_task.await;
    Ok(())
}
