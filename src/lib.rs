//! `sigma` - adaptive traffic-signal phase scheduler
//!
//! Turns per-direction congestion scores into green times with a small
//! fuzzy allocator, runs the resulting four-way cycle in real time, and
//! keeps an embedded signal controller in step over a serial line.
//!
//! The pieces, bottom up:
//!
//! - [`schedule`]: directions and per-direction timing
//! - [`allocator`]: scores to schedule
//! - [`phase`]: cycle timeline, countdowns and the tick task
//! - [`serial`]: device line protocol and link ownership
//! - [`store`]: shared state read by the API
//! - [`controller`]: the entry point for score producers
//! - [`api`]: HTTP surface

pub mod allocator;
pub mod api;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod observability;
pub mod phase;
pub mod schedule;
pub mod serial;
pub mod store;
