//! Line protocol spoken with the signal controller.
//!
//! Outbound (host to device), one schedule per line in rotation order:
//!
//! ```text
//! g0,r0,g1,r1,g2,r2,g3,r3
//! ```
//!
//! Inbound (device to host):
//!
//! ```text
//! RT,<dir>,<remaining>,<g0>,<g1>,<g2>,<g3>,<r0>,<r1>,<r2>,<r3>
//! SCHED,<g0>,<r0>,<g1>,<r1>,<g2>,<r2>,<g3>,<r3>
//! ```
//!
//! Anything else, including a known tag with the wrong field count or an
//! unparsable field, is not a message and is dropped by the reader.

use serde::Serialize;

use crate::schedule::{Direction, PerDirection, Schedule, Timing};

/// Tag of the live phase report.
pub const RT_TAG: &str = "RT";

/// Tag of the schedule echo.
pub const SCHED_TAG: &str = "SCHED";

/// Fields in an `RT` line, tag included.
pub const RT_FIELDS: usize = 11;

/// Fields in a `SCHED` line, tag included.
pub const SCHED_FIELDS: usize = 9;

/// Fields in an outbound schedule line.
pub const COMMAND_FIELDS: usize = 8;

/// Live phase report from the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RtReport {
    /// Direction the device is serving.
    pub active_direction: Direction,
    /// Seconds left in the device's current segment.
    pub remaining: i64,
    /// Green countdown per direction.
    pub green: PerDirection<i64>,
    /// Red countdown per direction.
    pub red: PerDirection<i64>,
}

/// A classified inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundLine {
    /// `RT,...` live report.
    Realtime(RtReport),
    /// `SCHED,...` schedule echo.
    Schedule(Schedule),
}

impl InboundLine {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Realtime(_) => "rt",
            Self::Schedule(_) => "sched",
        }
    }
}

/// Encodes `schedule` as an outbound line, newline included. Every value is
/// rounded to the nearest whole second.
#[must_use]
pub fn encode_schedule(schedule: &Schedule) -> String {
    let fields: Vec<String> = Direction::ALL
        .iter()
        .flat_map(|&d| {
            let t = schedule.timing(d);
            [round_field(t.green), round_field(t.red)]
        })
        .map(|v| v.to_string())
        .collect();
    format!("{}\n", fields.join(","))
}

/// Decodes an outbound schedule line, as the device would.
#[must_use]
pub fn decode_schedule(line: &str) -> Option<Schedule> {
    let fields: Vec<&str> = line.trim().split(',').collect();
    schedule_from_pairs(&fields)
}

/// Classifies a trimmed inbound line. Returns `None` for anything that is
/// not a well-formed `RT` or `SCHED` message.
#[must_use]
pub fn parse_line(line: &str) -> Option<InboundLine> {
    let line = line.trim();
    let fields: Vec<&str> = line.split(',').collect();
    match fields.first().copied() {
        Some(RT_TAG) if fields.len() == RT_FIELDS => parse_rt(&fields[1..]).map(InboundLine::Realtime),
        Some(SCHED_TAG) if fields.len() == SCHED_FIELDS => {
            schedule_from_pairs(&fields[1..]).map(InboundLine::Schedule)
        }
        _ => None,
    }
}

fn parse_rt(fields: &[&str]) -> Option<RtReport> {
    let active_direction = fields[0].parse().ok()?;
    let remaining = parse_whole(fields[1])?;
    let green = per_direction(&fields[2..6])?;
    let red = per_direction(&fields[6..10])?;
    Some(RtReport {
        active_direction,
        remaining,
        green,
        red,
    })
}

fn per_direction(fields: &[&str]) -> Option<PerDirection<i64>> {
    let values = [
        parse_whole(fields[0])?,
        parse_whole(fields[1])?,
        parse_whole(fields[2])?,
        parse_whole(fields[3])?,
    ];
    Some(PerDirection::from_fn(|d| values[d.index()]))
}

fn schedule_from_pairs(fields: &[&str]) -> Option<Schedule> {
    if fields.len() != COMMAND_FIELDS {
        return None;
    }
    let mut values = [0.0; COMMAND_FIELDS];
    for (slot, field) in values.iter_mut().zip(fields) {
        *slot = parse_number(field)?;
    }
    Some(Schedule(PerDirection::from_fn(|d| Timing {
        green: values[2 * d.index()],
        red: values[2 * d.index() + 1],
    })))
}

fn parse_number(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Device values arrive as integers but may carry a fractional part;
/// the fraction is dropped.
#[allow(clippy::cast_possible_truncation)]
fn parse_whole(field: &str) -> Option<i64> {
    parse_number(field).map(|v| v.trunc() as i64)
}

#[allow(clippy::cast_possible_truncation)]
fn round_field(value: f64) -> i64 {
    if value.is_finite() { value.round() as i64 } else { 0 }
}
