//! Metrics collection.
//!
//! Prometheus-compatible metrics with typed convenience functions for
//! recording measurements. Every label value comes from a closed set.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::SigmaError;
use crate::schedule::Direction;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `SigmaError::Io` if the recorder or listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), SigmaError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| SigmaError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!("sigma_cycles_total", "Completed signal cycles");
    describe_counter!(
        "sigma_schedules_adopted_total",
        "Pending schedules adopted at a cycle boundary"
    );
    describe_counter!(
        "sigma_schedules_staged_total",
        "Schedules placed in the pending slot"
    );
    describe_counter!(
        "sigma_serial_writes_total",
        "Schedule writes to the device by outcome"
    );
    describe_counter!(
        "sigma_serial_lines_total",
        "Classified inbound serial lines by kind"
    );
    describe_counter!(
        "sigma_serial_reconnects_total",
        "Times the serial link was opened"
    );
    describe_gauge!(
        "sigma_active_direction",
        "Index of the direction currently served by the engine"
    );
    describe_gauge!(
        "sigma_cycle_length_seconds",
        "Length of the running cycle in seconds"
    );
}

/// Records a completed cycle.
pub fn record_cycle_completed() {
    counter!("sigma_cycles_total").increment(1);
}

/// Records a schedule adoption.
pub fn record_schedule_adopted() {
    counter!("sigma_schedules_adopted_total").increment(1);
}

/// Records a staged schedule.
pub fn record_schedule_staged() {
    counter!("sigma_schedules_staged_total").increment(1);
}

/// Records the outcome of a device write.
pub fn record_serial_write(success: bool) {
    let outcome = if success { "ok" } else { "failed" };
    counter!("sigma_serial_writes_total", "outcome" => outcome).increment(1);
}

/// Records a classified inbound line. `kind` is `"rt"`, `"sched"` or
/// `"ignored"`.
pub fn record_serial_line(kind: &'static str) {
    counter!("sigma_serial_lines_total", "kind" => kind).increment(1);
}

/// Records the serial link being (re)opened.
pub fn record_serial_reconnect() {
    counter!("sigma_serial_reconnects_total").increment(1);
}

/// Sets the active direction gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_direction(direction: Direction) {
    gauge!("sigma_active_direction").set(direction.index() as f64);
}

/// Sets the cycle length gauge.
pub fn set_cycle_length(seconds: f64) {
    gauge!("sigma_cycle_length_seconds").set(seconds);
}
