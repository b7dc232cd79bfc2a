//! # Mesh Bus - Durable Message Bus Adapter
//!
//! Publish/subscribe/replay over a durable, at-least-once log, with
//! bounded in-flight delivery, redelivery under an
//! exponential-backoff-with-jitter policy, and a dead-letter path for
//! exhausted retries.
//!
//! ## Delivery Semantics
//!
//! - **At-least-once**: a handler failure or ack-wait timeout causes
//!   redelivery. Consumers must be idempotent; deduplicate by
//!   `envelope_hash` (see [`dedupe`]) when side effects are not
//!   naturally idempotent. That duty belongs to the consumer, not the
//!   bus adapter.
//! - **Ordering**: within one subject, delivery order is preserved for a
//!   single durable consumer. Across concurrent publishers there is no
//!   cross-publisher ordering guarantee.
//! - **Backpressure**: each consumer has a bounded number of
//!   unacknowledged in-flight messages; publishers block on a full
//!   consumer queue.
//! - **Failure policy**: while disconnected, publishes fail fast with a
//!   transport error unless the caller supplies an explicit wait budget.
//!   Retry exhaustion surfaces the message on the dead-letter subject,
//!   never a silent drop.
//!
//! The broker seam is the [`MessageBus`] trait; [`InMemoryDurableBus`]
//! is the in-process implementation, and a networked JetStream-style
//! deployment substitutes without touching call sites.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod config;
pub mod dedupe;
pub mod errors;
pub mod memory;
pub mod stream;

// Re-export main types
pub use bus::{handler_fn, HandlerError, MessageBus, MessageHandler, PublishContext, Subscription};
pub use config::{BusConfig, ConsumerConfig, DeliverPolicy, RetentionPolicy, RetryPolicy, StreamConfig};
pub use dedupe::{DedupeError, DedupeStore, DedupingHandler, TimeBoundedDedupeCache};
pub use errors::BusError;
pub use memory::{BusCounters, CounterSnapshot, DeadLetter, InMemoryDurableBus};
pub use stream::subject_matches;

/// Dead-letter subject for messages that exhausted their retries.
pub const DLQ_SUBJECT: &str = "_mesh.dlq";

/// Default bound on unacknowledged in-flight messages per consumer.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;
