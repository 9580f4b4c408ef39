//! Structured event stream.
//!
//! Discrete, typed events emitted while the controller runs. Events are
//! serialized as newline-delimited JSON (JSONL) with a monotonically
//! increasing sequence number.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::schedule::Schedule;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during controller operation.
///
/// Each variant is tagged with `"type"` when serialized so consumers can
/// dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The phase engine started its tick loop.
    EngineStarted {
        /// When the engine started.
        timestamp: DateTime<Utc>,
        /// Schedule the first cycle runs.
        schedule: Schedule,
        /// Length of the first cycle in seconds.
        cycle_length: f64,
    },

    /// The phase engine stopped.
    EngineStopped {
        /// When the engine stopped.
        timestamp: DateTime<Utc>,
        /// Human-readable stop reason.
        reason: String,
        /// Cycles completed over the engine's lifetime.
        cycles_completed: u64,
    },

    /// A full rotation finished.
    CycleCompleted {
        /// When the boundary was observed.
        timestamp: DateTime<Utc>,
        /// One-based count of completed cycles.
        cycle: u64,
        /// Length of the cycle that just started.
        cycle_length: f64,
    },

    /// A schedule was put in the pending slot.
    ScheduleStaged {
        /// When the schedule was staged.
        timestamp: DateTime<Utc>,
        /// The staged schedule.
        schedule: Schedule,
        /// Whether an unadopted schedule was replaced.
        superseded: bool,
    },

    /// A pending schedule became active at a cycle boundary.
    ScheduleAdopted {
        /// When the schedule was adopted.
        timestamp: DateTime<Utc>,
        /// The adopted schedule.
        schedule: Schedule,
        /// Length of the cycle it drives.
        cycle_length: f64,
    },

    /// A schedule was written to the device.
    ScheduleTransmitted {
        /// When the write completed or failed.
        timestamp: DateTime<Utc>,
        /// Wire payload without the trailing newline.
        payload: String,
        /// Whether the write succeeded.
        success: bool,
    },

    /// The serial link opened or closed.
    DeviceLinkChanged {
        /// When the change was observed.
        timestamp: DateTime<Utc>,
        /// Device path.
        port: String,
        /// Whether the link is now open.
        connected: bool,
        /// Failure detail when the link went down.
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each [`emit`](Self::emit) increments the sequence counter, writes one
/// JSON line and flushes. Serialization or I/O failures are dropped.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::noop()
    }
}
