//! Newline-delimited text codec for the device link.
//!
//! Decoding is permissive: bytes that are not valid UTF-8 are dropped
//! rather than failing the stream, surrounding whitespace (including a
//! trailing `\r`) is trimmed, and blank lines are skipped. A line longer
//! than the configured limit is discarded up to its newline so a device
//! that never sends `\n` cannot grow the buffer without bound.

use std::io;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Default upper bound on a single inbound line, in bytes.
pub const DEFAULT_MAX_LINE: usize = 1024;

/// Line codec for the device link.
#[derive(Debug, Clone)]
pub struct DeviceLineCodec {
    max_line: usize,
    discarding: bool,
}

impl DeviceLineCodec {
    /// Creates a codec with the default line limit.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE)
    }

    /// Creates a codec that discards lines longer than `max_line` bytes.
    #[must_use]
    pub const fn with_max_line(max_line: usize) -> Self {
        Self {
            max_line,
            discarding: false,
        }
    }
}

impl Default for DeviceLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for DeviceLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let Some(pos) = buf.iter().position(|&b| b == b'\n') else {
                if buf.len() > self.max_line {
                    tracing::warn!(limit = self.max_line, "inbound line exceeds limit, discarding");
                    buf.clear();
                    self.discarding = true;
                }
                return Ok(None);
            };

            let line = buf.split_to(pos + 1);
            if std::mem::take(&mut self.discarding) || pos > self.max_line {
                continue;
            }
            if let Some(text) = clean_line(&line[..pos]) {
                return Ok(Some(text));
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        let rest = buf.split();
        if std::mem::take(&mut self.discarding) {
            return Ok(None);
        }
        Ok(clean_line(&rest))
    }
}

impl Encoder<String> for DeviceLineCodec {
    type Error = io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        if !item.ends_with('\n') {
            dst.put_u8(b'\n');
        }
        Ok(())
    }
}

/// Lossy UTF-8 decode with invalid sequences removed, then trimmed.
fn clean_line(bytes: &[u8]) -> Option<String> {
    let text: String = String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
