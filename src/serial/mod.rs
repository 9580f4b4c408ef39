//! Serial link to the physical signal controller.
//!
//! - [`protocol`]: the text line format in both directions
//! - [`codec`]: newline framing over the byte stream
//! - [`link`]: how a byte stream to the device is opened
//! - [`bridge`]: connection ownership, the reader task and transmits

pub mod bridge;
pub mod codec;
pub mod link;
pub mod protocol;

pub use bridge::{BridgeSettings, ReadOutcome, SerialBridge, SerialStatus, ingest_line};
pub use codec::DeviceLineCodec;
pub use link::{DeviceLink, DisabledOpener, LinkOpener, SerialPortOpener};
pub use protocol::{InboundLine, RtReport, decode_schedule, encode_schedule, parse_line};
