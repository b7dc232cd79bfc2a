//! Benchmark configuration from environment variables.

use std::env;
use std::time::Duration;

/// Parameters for one ping-pong benchmark run.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `MESH_BENCH_MESSAGES` | `1000` | Round-trips to measure |
/// | `MESH_BENCH_CONCURRENCY` | `10` | Sending workers |
/// | `MESH_BENCH_PAYLOAD_BYTES` | `256` | Ping payload size |
/// | `MESH_BENCH_WARMUP` | `100` | Warmup round-trips (discarded) |
/// | `MESH_BENCH_DURATION_SECS` | `30` | Test duration ceiling |
/// | `MESH_BENCH_P50_MS` | `5.0` | p50 threshold, milliseconds |
/// | `MESH_BENCH_P95_MS` | `20.0` | p95 threshold, milliseconds |
/// | `MESH_BENCH_SKIP` | `false` | Skip performance testing |
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Round-trips measured in the main phase.
    pub message_count: usize,
    /// Number of concurrent sending workers.
    pub concurrency: usize,
    /// Ping payload size in bytes.
    pub payload_bytes: usize,
    /// Warmup round-trips, excluded from statistics.
    pub warmup_count: usize,
    /// Ceiling on each phase's wall-clock duration.
    pub duration_ceiling: Duration,
    /// p50 latency threshold in milliseconds.
    pub p50_threshold_ms: f64,
    /// p95 latency threshold in milliseconds.
    pub p95_threshold_ms: f64,
    /// Skip performance testing entirely (constrained environments).
    pub skip: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            message_count: 1000,
            concurrency: 10,
            payload_bytes: 256,
            warmup_count: 100,
            duration_ceiling: Duration::from_secs(30),
            p50_threshold_ms: 5.0,
            p95_threshold_ms: 20.0,
            skip: false,
        }
    }
}

impl BenchConfig {
    /// Read configuration from environment variables, falling back to
    /// defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            message_count: env_parse("MESH_BENCH_MESSAGES").unwrap_or(defaults.message_count),
            concurrency: env_parse("MESH_BENCH_CONCURRENCY").unwrap_or(defaults.concurrency),
            payload_bytes: env_parse("MESH_BENCH_PAYLOAD_BYTES").unwrap_or(defaults.payload_bytes),
            warmup_count: env_parse("MESH_BENCH_WARMUP").unwrap_or(defaults.warmup_count),
            duration_ceiling: env_parse("MESH_BENCH_DURATION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.duration_ceiling),
            p50_threshold_ms: env_parse("MESH_BENCH_P50_MS").unwrap_or(defaults.p50_threshold_ms),
            p95_threshold_ms: env_parse("MESH_BENCH_P95_MS").unwrap_or(defaults.p95_threshold_ms),
            skip: env::var("MESH_BENCH_SKIP")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.skip),
        }
    }

    /// Validate the parameter combination.
    ///
    /// # Errors
    ///
    /// `crate::BenchError::Config` on a zero message count or zero
    /// concurrency.
    pub fn validate(&self) -> Result<(), crate::BenchError> {
        if self.message_count == 0 {
            return Err(crate::BenchError::Config(
                "message_count must be positive".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(crate::BenchError::Config(
                "concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
