//! Serial bridge to the physical signal controller.
//!
//! One connection, opened lazily on first use and kept open across calls.
//! Any I/O failure closes it; the next use reopens it from scratch and
//! waits the settle delay again. Reads and writes share the connection
//! lock, and the reader releases it between reads.
//!
//! Nothing here returns an error to the caller: a failed transmit is
//! `false`, a failed read is [`ReadOutcome::Unavailable`], and the engine
//! keeps running in software either way.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::schema::SerialConfig;
use crate::error::SerialError;
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics;
use crate::schedule::Schedule;
use crate::store::StateStore;

use super::codec::DeviceLineCodec;
use super::link::{DeviceLink, LinkOpener};
use super::protocol::{encode_schedule, parse_line};

type Connection = Framed<Box<dyn DeviceLink>, DeviceLineCodec>;

/// Timing knobs for the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Wait after opening before first use.
    pub settle_delay: Duration,
    /// Upper bound on a single read.
    pub read_timeout: Duration,
    /// Pause after an empty read.
    pub idle_backoff: Duration,
    /// Upper bound on a single write.
    pub write_timeout: Duration,
}

impl From<&SerialConfig> for BridgeSettings {
    fn from(config: &SerialConfig) -> Self {
        Self {
            settle_delay: config.settle_delay,
            read_timeout: config.read_timeout,
            idle_backoff: config.idle_backoff,
            write_timeout: config.read_timeout,
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self::from(&SerialConfig::default())
    }
}

/// Result of one read attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A non-empty, trimmed line.
    Line(String),
    /// Nothing arrived within the read timeout.
    Idle,
    /// The link could not be opened or just failed.
    Unavailable,
}

/// Link health as reported to the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialStatus {
    /// Whether the link is open.
    pub ready: bool,
    /// Device path.
    pub port: String,
    /// Baud rate.
    pub baud: u32,
    /// `"ok"` or the reason the link is down.
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkState {
    Unknown,
    Up,
    Down(String),
}

/// Owner of the single device connection.
pub struct SerialBridge {
    opener: Box<dyn LinkOpener>,
    settings: BridgeSettings,
    connection: tokio::sync::Mutex<Option<Connection>>,
    link: Mutex<LinkState>,
    events: Arc<EventEmitter>,
}

impl SerialBridge {
    /// Creates a bridge; nothing is opened until first use.
    #[must_use]
    pub fn new(
        opener: Box<dyn LinkOpener>,
        settings: BridgeSettings,
        events: Arc<EventEmitter>,
    ) -> Self {
        Self {
            opener,
            settings,
            connection: tokio::sync::Mutex::new(None),
            link: Mutex::new(LinkState::Unknown),
            events,
        }
    }

    /// Device path.
    #[must_use]
    pub fn port(&self) -> &str {
        self.opener.port()
    }

    /// Whether the last open or I/O attempt left the link up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        *self.link.lock().unwrap_or_else(PoisonError::into_inner) == LinkState::Up
    }

    /// Reads the next line, waiting at most the read timeout.
    pub async fn read_line(&self) -> ReadOutcome {
        let mut slot = self.connection.lock().await;
        let Ok(conn) = self.ensure_open(&mut slot).await else {
            return ReadOutcome::Unavailable;
        };

        let failure = match tokio::time::timeout(self.settings.read_timeout, conn.next()).await {
            Err(_) => return ReadOutcome::Idle,
            Ok(Some(Ok(line))) => return ReadOutcome::Line(line),
            Ok(Some(Err(e))) => SerialError::Io(e),
            Ok(None) => SerialError::Closed,
        };
        self.close(&mut slot, &failure);
        ReadOutcome::Unavailable
    }

    /// Serializes `schedule` and writes it to the device.
    ///
    /// Returns whether the write succeeded. On failure the connection is
    /// closed and the next use reopens it.
    pub async fn send_schedule(&self, schedule: &Schedule) -> bool {
        let payload = encode_schedule(schedule);
        let result = self.write_line(payload.clone()).await;
        let success = result.is_ok();
        let shown = payload.trim_end().to_string();

        match &result {
            Ok(()) => info!(port = self.port(), payload = %shown, "schedule sent to device"),
            Err(SerialError::Disabled) => debug!(payload = %shown, "serial disabled, schedule not sent"),
            Err(e) => warn!(port = self.port(), error = %e, "schedule not sent"),
        }
        metrics::record_serial_write(success);
        self.events.emit(Event::ScheduleTransmitted {
            timestamp: Utc::now(),
            payload: shown,
            success,
        });
        success
    }

    /// Probes the link, opening it if needed, and reports its health.
    pub async fn status(&self) -> SerialStatus {
        let mut slot = self.connection.lock().await;
        let opened = self.ensure_open(&mut slot).await.map(|_| ());
        drop(slot);

        SerialStatus {
            ready: opened.is_ok(),
            port: self.opener.port().to_string(),
            baud: self.opener.baud(),
            detail: opened.map_or_else(|e| e.to_string(), |()| "ok".to_string()),
        }
    }

    /// Spawns the background reader.
    ///
    /// Classified lines are cached in `store`; everything else is dropped.
    /// The task runs until `cancel` fires.
    pub fn spawn_reader(
        self: &Arc<Self>,
        store: Arc<StateStore>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            debug!(port = bridge.port(), "serial reader started");
            loop {
                let outcome = tokio::select! {
                    () = cancel.cancelled() => break,
                    outcome = bridge.read_line() => outcome,
                };
                let pause = match outcome {
                    ReadOutcome::Line(line) => {
                        ingest_line(&store, &line, Instant::now());
                        continue;
                    }
                    ReadOutcome::Idle => bridge.settings.idle_backoff,
                    ReadOutcome::Unavailable => bridge
                        .settings
                        .settle_delay
                        .max(bridge.settings.idle_backoff),
                };
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(pause) => {}
                }
            }
            debug!("serial reader stopped");
        })
    }

    async fn write_line(&self, payload: String) -> Result<(), SerialError> {
        let mut slot = self.connection.lock().await;
        let conn = self.ensure_open(&mut slot).await?;

        let failure = match tokio::time::timeout(self.settings.write_timeout, conn.send(payload)).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => SerialError::Io(e),
            Err(_) => SerialError::Timeout(self.settings.write_timeout),
        };
        self.close(&mut slot, &failure);
        Err(failure)
    }

    async fn ensure_open<'a>(
        &self,
        slot: &'a mut Option<Connection>,
    ) -> Result<&'a mut Connection, SerialError> {
        if slot.is_none() {
            let link = match self.opener.open().await {
                Ok(link) => link,
                Err(e) => {
                    self.mark_down(&e);
                    return Err(e);
                }
            };
            tokio::time::sleep(self.settings.settle_delay).await;
            *slot = Some(Framed::new(link, DeviceLineCodec::new()));
            self.mark_up();
        }
        slot.as_mut().ok_or(SerialError::Closed)
    }

    fn close(&self, slot: &mut Option<Connection>, reason: &SerialError) {
        *slot = None;
        self.mark_down(reason);
    }

    fn mark_up(&self) {
        let previous = {
            let mut link = self.link.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *link, LinkState::Up)
        };
        metrics::record_serial_reconnect();
        if previous != LinkState::Up {
            info!(port = self.port(), baud = self.opener.baud(), "serial link open");
            self.events.emit(Event::DeviceLinkChanged {
                timestamp: Utc::now(),
                port: self.port().to_string(),
                connected: true,
                detail: None,
            });
        }
    }

    fn mark_down(&self, reason: &SerialError) {
        let detail = reason.to_string();
        let previous = {
            let mut link = self.link.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *link, LinkState::Down(detail.clone()))
        };
        if previous == LinkState::Down(detail.clone()) {
            trace!(port = self.port(), error = %detail, "serial link still down");
            return;
        }
        if matches!(reason, SerialError::Disabled) {
            debug!(port = self.port(), "serial link disabled");
        } else {
            warn!(port = self.port(), error = %detail, "serial link unavailable");
        }
        self.events.emit(Event::DeviceLinkChanged {
            timestamp: Utc::now(),
            port: self.port().to_string(),
            connected: false,
            detail: Some(detail),
        });
    }
}

impl std::fmt::Debug for SerialBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialBridge")
            .field("port", &self.opener.port())
            .field("baud", &self.opener.baud())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Classifies one inbound line and caches it in `store`. Returns whether
/// the line was a recognised message.
pub fn ingest_line(store: &StateStore, line: &str, now: Instant) -> bool {
    if let Some(inbound) = parse_line(line) {
        let kind = inbound.kind();
        metrics::record_serial_line(kind);
        trace!(kind, "device report");
        store.record_report(inbound, now);
        true
    } else {
        metrics::record_serial_line("ignored");
        debug!(line = %sanitize_for_log(line, 120), "ignoring unrecognised device line");
        false
    }
}

/// Truncates and strips control characters from device input before logging.
fn sanitize_for_log(input: &str, max_len: usize) -> String {
    input
        .chars()
        .take(max_len)
        .map(|c| {
            if c.is_control() && c != '\t' {
                '\u{FFFD}'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    use super::*;
    use crate::phase::SegmentTimes;
    use crate::schedule::Direction;
    use crate::serial::link::DisabledOpener;

    /// Hands out queued in-memory links, then fails.
    struct QueueOpener(Mutex<VecDeque<DuplexStream>>);

    impl QueueOpener {
        fn new(links: Vec<DuplexStream>) -> Self {
            Self(Mutex::new(links.into()))
        }
    }

    #[async_trait]
    impl LinkOpener for QueueOpener {
        async fn open(&self) -> Result<Box<dyn DeviceLink>, SerialError> {
            let next = self.0.lock().unwrap().pop_front();
            next.map(|s| Box::new(s) as Box<dyn DeviceLink>)
                .ok_or_else(|| SerialError::OpenFailed {
                    port: "mem".to_string(),
                    reason: "no device".to_string(),
                })
        }

        fn port(&self) -> &str {
            "mem"
        }

        fn baud(&self) -> u32 {
            115_200
        }
    }

    fn settings() -> BridgeSettings {
        BridgeSettings {
            settle_delay: Duration::ZERO,
            read_timeout: Duration::from_millis(100),
            idle_backoff: Duration::from_millis(10),
            write_timeout: Duration::from_millis(100),
        }
    }

    fn bridge(links: Vec<DuplexStream>) -> Arc<SerialBridge> {
        Arc::new(SerialBridge::new(
            Box::new(QueueOpener::new(links)),
            settings(),
            Arc::new(EventEmitter::noop()),
        ))
    }

    #[tokio::test]
    async fn send_schedule_writes_wire_line() {
        let (host, device) = tokio::io::duplex(256);
        let bridge = bridge(vec![host]);

        assert!(bridge.send_schedule(&Schedule::uniform(18.4, 50.6)).await);
        assert!(bridge.is_connected());

        let mut lines = BufReader::new(device).lines();
        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(line, "18,51,18,51,18,51,18,51");
    }

    #[tokio::test]
    async fn read_line_trims_and_times_out() {
        let (host, mut device) = tokio::io::duplex(256);
        let bridge = bridge(vec![host]);

        device.write_all(b"  SCHED,10,50,10,50,10,50,10,50\r\n").await.unwrap();
        assert_eq!(
            bridge.read_line().await,
            ReadOutcome::Line("SCHED,10,50,10,50,10,50,10,50".to_string())
        );
        assert_eq!(bridge.read_line().await, ReadOutcome::Idle);
        drop(device);
    }

    #[tokio::test]
    async fn hangup_closes_and_next_use_reopens() {
        let (first, device) = tokio::io::duplex(256);
        let (second, mut replacement) = tokio::io::duplex(256);
        let bridge = bridge(vec![first, second]);

        assert_eq!(bridge.read_line().await, ReadOutcome::Idle);
        drop(device);
        assert_eq!(bridge.read_line().await, ReadOutcome::Unavailable);
        assert!(!bridge.is_connected());

        replacement.write_all(b"RT,0,5,5,0,0,0,0,8,20,32\n").await.unwrap();
        assert_eq!(
            bridge.read_line().await,
            ReadOutcome::Line("RT,0,5,5,0,0,0,0,8,20,32".to_string())
        );
        assert!(bridge.is_connected());

        let status = bridge.status().await;
        assert!(status.ready);
        assert_eq!(status.detail, "ok");
    }

    #[tokio::test]
    async fn write_to_closed_device_reports_false() {
        let (host, device) = tokio::io::duplex(64);
        let bridge = bridge(vec![host]);
        drop(device);

        assert!(!bridge.send_schedule(&Schedule::default()).await);
        assert!(!bridge.is_connected());

        let status = bridge.status().await;
        assert!(!status.ready);
        assert!(status.detail.contains("no device"));
    }

    #[tokio::test]
    async fn disabled_bridge_never_sends() {
        let bridge = SerialBridge::new(
            Box::new(DisabledOpener::new("/dev/ttyACM0", 115_200)),
            settings(),
            Arc::new(EventEmitter::noop()),
        );
        assert!(!bridge.send_schedule(&Schedule::default()).await);
        let status = bridge.status().await;
        assert!(!status.ready);
        assert_eq!(status.port, "/dev/ttyACM0");
        assert_eq!(status.detail, "serial link disabled");
    }

    #[tokio::test]
    async fn reader_task_caches_reports() {
        let (host, mut device) = tokio::io::duplex(256);
        let bridge = bridge(vec![host]);
        let store = Arc::new(StateStore::new(
            Schedule::default(),
            SegmentTimes::default(),
            Instant::now(),
        ));
        let cancel = CancellationToken::new();
        let handle = bridge.spawn_reader(Arc::clone(&store), cancel.clone());

        device
            .write_all(b"garbage\nSCHED,10,50,10,50,10\nRT,3,7,0,0,0,7,9,21,33,0\nSCHED,20,60,20,60,20,60,20,60\n")
            .await
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let view = store.device_view(Instant::now());
            if view.live.is_some() && view.schedule == Schedule::uniform(20.0, 60.0) {
                assert_eq!(view.live.unwrap().active_direction, Direction::West);
                break;
            }
            assert!(Instant::now() < deadline, "reader did not cache reports");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        handle.await.unwrap();
    }

    /// Hands out a single scripted link.
    struct ScriptedOpener(Mutex<Option<tokio_test::io::Mock>>);

    #[async_trait]
    impl LinkOpener for ScriptedOpener {
        async fn open(&self) -> Result<Box<dyn DeviceLink>, SerialError> {
            self.0
                .lock()
                .unwrap()
                .take()
                .map(|m| Box::new(m) as Box<dyn DeviceLink>)
                .ok_or(SerialError::Closed)
        }

        fn port(&self) -> &str {
            "scripted"
        }

        fn baud(&self) -> u32 {
            9_600
        }
    }

    #[tokio::test]
    async fn scripted_device_exchange() {
        let mock = tokio_test::io::Builder::new()
            .write(b"20,60,20,60,20,60,20,60\n")
            .read(b"SCHED,20,60,20,60,20,60,20,60\r\n")
            .build();
        let bridge = SerialBridge::new(
            Box::new(ScriptedOpener(Mutex::new(Some(mock)))),
            settings(),
            Arc::new(EventEmitter::noop()),
        );

        assert!(bridge.send_schedule(&Schedule::uniform(20.0, 60.0)).await);
        assert_eq!(
            bridge.read_line().await,
            ReadOutcome::Line("SCHED,20,60,20,60,20,60,20,60".to_string())
        );
    }

    #[test]
    fn ingest_ignores_malformed_lines() {
        let store = StateStore::new(Schedule::default(), SegmentTimes::default(), Instant::now());
        assert!(!ingest_line(&store, "SCHED,10,50,10,50,10,50", Instant::now()));
        assert!(store.device_view(Instant::now()).live.is_none());
        assert!(ingest_line(&store, "SCHED,10,50,10,50,10,50,10,50", Instant::now()));
    }

    #[test]
    fn sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("a\u{1b}[2Jb", 10), "a\u{FFFD}[2Jb");
        assert_eq!(sanitize_for_log("abcdef", 3), "abc");
    }
}
