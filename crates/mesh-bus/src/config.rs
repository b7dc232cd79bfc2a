//! Declarative stream, consumer, and retry configuration.
//!
//! Stream and consumer descriptors are created once at startup and are
//! read-only thereafter, except for explicit administrative
//! reconfiguration.

use crate::DEFAULT_MAX_IN_FLIGHT;
use rand::Rng;
use std::env;
use std::time::Duration;

/// How a stream retains its log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Retain up to the configured age/byte limits.
    Limits,
    /// Retain while any consumer still has interest.
    Interest,
    /// Remove entries once acknowledged by the work queue.
    WorkQueue,
}

/// Where a consumer starts reading the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverPolicy {
    /// Replay the full retained log, then go live.
    All,
    /// Live messages only.
    New,
    /// Entries published at or after the given epoch-millisecond time,
    /// then live.
    ByStartTime(u64),
}

/// Declarative stream descriptor.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Stream name.
    pub name: String,
    /// Subject filters bound to this stream.
    pub subjects: Vec<String>,
    /// Retention age cap.
    pub max_age: Duration,
    /// Retention byte cap.
    pub max_bytes: u64,
    /// Replica count (honored by networked deployments).
    pub replicas: usize,
    /// Retention policy.
    pub retention: RetentionPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            name: "mesh-messages".to_string(),
            subjects: vec![">".to_string()],
            max_age: Duration::from_secs(24 * 60 * 60),
            max_bytes: 1024 * 1024 * 1024,
            replicas: 3,
            retention: RetentionPolicy::Limits,
        }
    }
}

/// Exponential-backoff-with-jitter policy governing redelivery and
/// reconnection.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied per attempt.
    pub multiplier: f64,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Attempts before giving up (including the first delivery).
    pub max_attempts: u32,
    /// Jitter fraction in `[0, 1]`: each delay is scaled by a random
    /// factor in `[1 - jitter, 1 + jitter]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(50),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            max_attempts: 5,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Jittered delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent as i32);
        let capped = scaled.min(self.max_delay.as_secs_f64());

        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = if jitter > 0.0 {
            rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter)
        } else {
            1.0
        };

        Duration::from_secs_f64((capped * factor).min(self.max_delay.as_secs_f64()))
    }
}

/// Declarative durable-consumer descriptor.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Durable consumer name.
    pub name: String,
    /// Subject filter (wildcards allowed).
    pub filter_subject: String,
    /// How long a delivery may remain unacknowledged before it counts
    /// as failed.
    pub ack_wait: Duration,
    /// Bound on unacknowledged in-flight messages (backpressure).
    pub max_in_flight: usize,
    /// Where this consumer starts reading.
    pub deliver_policy: DeliverPolicy,
    /// Redelivery policy.
    pub retry: RetryPolicy,
}

impl ConsumerConfig {
    /// Live consumer with default ack-wait and retry policy.
    #[must_use]
    pub fn live(name: impl Into<String>, filter_subject: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter_subject: filter_subject.into(),
            ack_wait: Duration::from_secs(5),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            deliver_policy: DeliverPolicy::New,
            retry: RetryPolicy::default(),
        }
    }
}

/// Environment-driven bus configuration.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `MESH_BUS_URL` | `mem://local` | Broker URL |
/// | `MESH_MAX_RECONNECTS` | `10` | Max reconnect attempts |
/// | `MESH_RECONNECT_WAIT_MS` | `500` | Base reconnect wait |
/// | `MESH_ACK_WAIT_MS` | `5000` | Consumer ack-wait |
/// | `MESH_MAX_IN_FLIGHT` | `64` | In-flight bound per consumer |
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Broker URL.
    pub url: String,
    /// Maximum reconnect attempts after a connection loss.
    pub max_reconnect_attempts: u32,
    /// Base wait between reconnect attempts.
    pub reconnect_wait: Duration,
    /// Default consumer ack-wait.
    pub ack_wait: Duration,
    /// Default consumer in-flight bound.
    pub max_in_flight: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: "mem://local".to_string(),
            max_reconnect_attempts: 10,
            reconnect_wait: Duration::from_millis(500),
            ack_wait: Duration::from_secs(5),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl BusConfig {
    /// Read configuration from environment variables, falling back to
    /// defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: env::var("MESH_BUS_URL").unwrap_or(defaults.url),
            max_reconnect_attempts: env_parse("MESH_MAX_RECONNECTS")
                .unwrap_or(defaults.max_reconnect_attempts),
            reconnect_wait: env_parse("MESH_RECONNECT_WAIT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect_wait),
            ack_wait: env_parse("MESH_ACK_WAIT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.ack_wait),
            max_in_flight: env_parse("MESH_MAX_IN_FLIGHT").unwrap_or(defaults.max_in_flight),
        }
    }

    /// Reconnect policy derived from this configuration.
    #[must_use]
    pub fn reconnect_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: self.reconnect_wait,
            max_attempts: self.max_reconnect_attempts,
            ..RetryPolicy::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
