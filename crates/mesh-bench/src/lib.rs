//! # Mesh Bench - Latency Benchmark Harness
//!
//! Round-trip ("ping-pong") latency measurement over the bus, percentile
//! computation, and pass/fail gating against SLA thresholds.
//!
//! One subscriber echoes every received ping back as a pong on a paired
//! subject; N concurrent workers publish pings stamped with a send
//! timestamp; a receiver measures elapsed time on pong arrival. After an
//! optional warmup phase (run once, discarded), the main phase runs
//! until the configured message count is fully round-tripped or the
//! duration ceiling elapses - the latter recorded as timeout errors,
//! never silently ignored.
//!
//! Thresholds and message parameters are overridable via environment
//! configuration so CI and local runs can diverge without code changes.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod percentile;
pub mod pingpong;

// Re-export main types
pub use config::BenchConfig;
pub use percentile::{histogram, percentile, HistogramBucket, HISTOGRAM_BOUNDS_MS};
pub use pingpong::{run_ping_pong_test, BenchmarkResult};

use thiserror::Error;

/// Benchmark harness errors.
#[derive(Debug, Error)]
pub enum BenchError {
    /// A bus operation failed during the benchmark.
    ///
    /// Per-message failures inside a phase (publish rejections, seal
    /// failures) are counted in the result's error tally instead; only
    /// setup failures abort the run.
    #[error(transparent)]
    Bus(#[from] mesh_bus::BusError),

    /// The benchmark is misconfigured.
    #[error("Invalid benchmark configuration: {0}")]
    Config(String),
}
