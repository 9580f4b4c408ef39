//! Device link abstraction.
//!
//! The bridge talks to anything that is a byte stream; [`LinkOpener`] is
//! the seam that produces one. Production uses [`SerialPortOpener`]; tests
//! hand the bridge in-memory pipes.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::SerialPortBuilderExt;

use crate::config::schema::SerialConfig;
use crate::error::SerialError;

/// A bidirectional byte stream to the device.
pub trait DeviceLink: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> DeviceLink for T {}

/// Opens a fresh link to the device.
#[async_trait]
pub trait LinkOpener: Send + Sync {
    /// Opens the link.
    ///
    /// # Errors
    ///
    /// Returns `SerialError::OpenFailed` when the device cannot be reached.
    async fn open(&self) -> Result<Box<dyn DeviceLink>, SerialError>;

    /// Device path for logs and status.
    fn port(&self) -> &str;

    /// Baud rate for logs and status.
    fn baud(&self) -> u32;
}

/// Opens a native serial port through `tokio-serial`.
#[derive(Debug, Clone)]
pub struct SerialPortOpener {
    port: String,
    baud: u32,
}

impl SerialPortOpener {
    /// Creates an opener for `port` at `baud`.
    #[must_use]
    pub fn new(port: impl Into<String>, baud: u32) -> Self {
        Self {
            port: port.into(),
            baud,
        }
    }
}

impl From<&SerialConfig> for SerialPortOpener {
    fn from(config: &SerialConfig) -> Self {
        Self::new(config.port.clone(), config.baud)
    }
}

#[async_trait]
impl LinkOpener for SerialPortOpener {
    async fn open(&self) -> Result<Box<dyn DeviceLink>, SerialError> {
        let stream = tokio_serial::new(&self.port, self.baud)
            .open_native_async()
            .map_err(|e| SerialError::OpenFailed {
                port: self.port.clone(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(stream))
    }

    fn port(&self) -> &str {
        &self.port
    }

    fn baud(&self) -> u32 {
        self.baud
    }
}

/// Opener used when serial is disabled; every attempt fails.
#[derive(Debug, Clone)]
pub struct DisabledOpener {
    port: String,
    baud: u32,
}

impl DisabledOpener {
    /// Creates a disabled opener that still reports the configured port.
    #[must_use]
    pub fn new(port: impl Into<String>, baud: u32) -> Self {
        Self {
            port: port.into(),
            baud,
        }
    }
}

#[async_trait]
impl LinkOpener for DisabledOpener {
    async fn open(&self) -> Result<Box<dyn DeviceLink>, SerialError> {
        Err(SerialError::Disabled)
    }

    fn port(&self) -> &str {
        &self.port
    }

    fn baud(&self) -> u32 {
        self.baud
    }
}
