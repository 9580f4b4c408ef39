//! Shared integration-test harness: the built binary, fixture paths and
//! controllers wired to in-memory devices.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::DuplexStream;
use tokio::time::Instant;

use sigma::allocator::FuzzyAllocator;
use sigma::controller::Controller;
use sigma::error::SerialError;
use sigma::observability::EventEmitter;
use sigma::phase::SegmentTimes;
use sigma::schedule::Schedule;
use sigma::serial::{BridgeSettings, DeviceLink, DisabledOpener, LinkOpener, SerialBridge};
use sigma::store::StateStore;

/// Path of a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Runs the `sigma` binary to completion.
#[allow(clippy::missing_panics_doc)]
pub fn run_sigma(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sigma"))
        .args(args)
        .env_remove("SIGMA_CONFIG")
        .env_remove("SIGMA_LOG_LEVEL")
        .output()
        .expect("failed to run sigma")
}

/// Hands out queued in-memory links, then reports the device missing.
pub struct QueueOpener(Mutex<VecDeque<DuplexStream>>);

impl QueueOpener {
    pub fn new(links: Vec<DuplexStream>) -> Self {
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

/// Bridge timings short enough for tests.
pub fn fast_settings() -> BridgeSettings {
    BridgeSettings {
        settle_delay: Duration::ZERO,
        read_timeout: Duration::from_millis(50),
        idle_backoff: Duration::from_millis(5),
        write_timeout: Duration::from_millis(200),
    }
}

/// A controller over a fresh store and the given opener.
pub fn controller_with(opener: Box<dyn LinkOpener>) -> Arc<Controller> {
    let events = Arc::new(EventEmitter::noop());
    let times = SegmentTimes::default();
    let store = Arc::new(StateStore::new(Schedule::default(), times, Instant::now()));
    let bridge = Arc::new(SerialBridge::new(opener, fast_settings(), Arc::clone(&events)));
    Arc::new(Controller::new(
        FuzzyAllocator::default(),
        store,
        bridge,
        times,
        events,
    ))
}

/// A controller with no device attached.
pub fn offline_controller() -> Arc<Controller> {
    controller_with(Box::new(DisabledOpener::new("/dev/null", 115_200)))
}

/// A controller whose device is the other end of `link`.
pub fn device_controller(link: DuplexStream) -> Arc<Controller> {
    controller_with(Box::new(QueueOpener::new(vec![link])))
}
