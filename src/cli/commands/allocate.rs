//! `allocate` command handler.
//!
//! Runs the fuzzy allocator once and prints the per-direction breakdown,
//! the resulting cycle length and the line that would go to the device.

use serde::Serialize;

use crate::allocator::FuzzyAllocator;
use crate::cli::args::{AllocateArgs, OutputFormat};
use crate::error::SigmaError;
use crate::phase::{SegmentTimes, cycle_length};
use crate::schedule::{Direction, PerDirection, Schedule};
use crate::serial::encode_schedule;

/// One direction's row of the allocation table.
#[derive(Debug, Clone, Serialize)]
struct Row {
    direction: Direction,
    score: f64,
    weight: f64,
    share: f64,
    green: f64,
    red: f64,
}

/// Full allocation report.
#[derive(Debug, Clone, Serialize)]
struct Report {
    directions: Vec<Row>,
    cycle_length: f64,
    payload: String,
}

/// Allocate green time from the four scores on the command line.
///
/// # Errors
///
/// Returns a config error if `--config` names an unusable file, or a JSON
/// error if the report cannot be serialized.
pub fn run(args: &AllocateArgs) -> Result<(), SigmaError> {
    let config = super::load_config(args.config.as_deref())?;
    let allocator = FuzzyAllocator::new(config.allocator.clone());
    let times = SegmentTimes::from(&config.engine);

    let raw = PerDirection {
        north: args.north,
        east: args.east,
        south: args.south,
        west: args.west,
    };
    let scores = raw.map(|_, &s| config.allocator.score_or_fallback(Some(s)));

    let report = build_report(&allocator, &scores, times);
    match args.format {
        OutputFormat::Human => print!("{}", render_human(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn build_report(
    allocator: &FuzzyAllocator,
    scores: &PerDirection<f64>,
    times: SegmentTimes,
) -> Report {
    let weights = allocator.weights(scores);
    let shares = allocator.shares(scores);
    let schedule: Schedule = allocator.allocate(scores);

    let directions = Direction::ALL
        .iter()
        .map(|&d| Row {
            direction: d,
            score: scores[d],
            weight: weights[d],
            share: shares[d],
            green: schedule.green(d),
            red: schedule.red(d),
        })
        .collect();

    Report {
        directions,
        cycle_length: cycle_length(&schedule, times),
        payload: encode_schedule(&schedule).trim_end().to_string(),
    }
}

fn render_human(report: &Report) -> String {
    use std::fmt::Write;

    let mut out = format!(
        "{:<9} {:>8} {:>7} {:>7} {:>8} {:>8}\n",
        "direction", "score", "weight", "share", "green", "red"
    );
    for row in &report.directions {
        let _ = writeln!(
            out,
            "{:<9} {:>8.2} {:>7.3} {:>7.3} {:>8.2} {:>8.2}",
            row.direction.as_str(),
            row.score,
            row.weight,
            row.share,
            row.green,
            row.red
        );
    }
    let _ = writeln!(out, "\ncycle length: {:.2}s", report.cycle_length);
    let _ = writeln!(out, "payload:      {}", report.payload);
    out
}
