//! # Envelope Dedupe Store
//!
//! At-least-once delivery means consumers see redelivered messages.
//! When a side effect is not naturally idempotent, consumers deduplicate
//! by envelope hash through this store.
//!
//! The store is an explicit, injectable interface (never a package-level
//! singleton) with a defined expiry policy:
//!
//! - Hashes are accepted only within the message timestamp window
//!   (60s past, 10s future)
//! - Recorded hashes are garbage-collected after the validity window
//!   expires, bounding memory while duplicates are still possible
//!
//! Replay-suppression (`PublishContext::replay_safe`) and
//! redelivery-deduplication are orthogonal, independently-enforced
//! controls; neither implies the other.

use crate::bus::{HandlerError, MessageHandler};
use async_trait::async_trait;
use mesh_envelope::Message;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

/// Errors from dedupe checks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DedupeError {
    /// The envelope hash has already been processed.
    #[error("Envelope {envelope_hash} has already been processed")]
    DuplicateEnvelope {
        /// The duplicated envelope hash.
        envelope_hash: String,
    },

    /// The message timestamp is too old for the dedupe window.
    #[error("Message timestamp {timestamp} is too old (threshold: {threshold})")]
    MessageTooOld {
        /// The message timestamp, epoch milliseconds.
        timestamp: u64,
        /// Oldest acceptable timestamp.
        threshold: u64,
    },

    /// The message timestamp is in the future beyond the allowed skew.
    #[error("Message timestamp {timestamp} is in the future (threshold: {threshold})")]
    MessageFromFuture {
        /// The message timestamp, epoch milliseconds.
        timestamp: u64,
        /// Newest acceptable timestamp.
        threshold: u64,
    },
}

/// Injectable duplicate-detection store keyed by envelope hash.
pub trait DedupeStore: Send + Sync {
    /// Validate the timestamp and record the hash atomically.
    ///
    /// # Errors
    ///
    /// - `DedupeError::MessageTooOld` / `MessageFromFuture` outside the
    ///   validity window.
    /// - `DedupeError::DuplicateEnvelope` when the hash was seen before.
    fn check_and_record(&self, envelope_hash: &str, timestamp: u64) -> Result<(), DedupeError>;

    /// Check for a hash without recording it.
    fn contains(&self, envelope_hash: &str) -> bool;
}

struct CacheState {
    seen: HashMap<String, u64>,
    last_gc: u64,
}

/// Time-bounded in-memory dedupe cache.
///
/// Entries are only accepted within the message timestamp window and
/// are garbage-collected after the validity window, which bounds memory
/// usage under sustained traffic.
pub struct TimeBoundedDedupeCache {
    state: Mutex<CacheState>,
    validity_window_ms: u64,
    gc_interval_ms: u64,
}

impl TimeBoundedDedupeCache {
    /// Default validity window: 2x the message timestamp window.
    pub const DEFAULT_VALIDITY_WINDOW_MS: u64 = 120_000;

    /// Default garbage collection interval.
    pub const DEFAULT_GC_INTERVAL_MS: u64 = 10_000;

    /// Maximum past age for valid timestamps.
    pub const MAX_AGE_MS: u64 = 60_000;

    /// Maximum future skew for valid timestamps.
    pub const MAX_FUTURE_SKEW_MS: u64 = 10_000;

    /// Cache with default windows.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Self::DEFAULT_VALIDITY_WINDOW_MS, Self::DEFAULT_GC_INTERVAL_MS)
    }

    /// Cache with custom validity/GC windows (milliseconds).
    #[must_use]
    pub fn with_config(validity_window_ms: u64, gc_interval_ms: u64) -> Self {
        Self {
            state: Mutex::new(CacheState {
                seen: HashMap::new(),
                last_gc: Self::current_millis(),
            }),
            validity_window_ms,
            gc_interval_ms,
        }
    }

    /// Number of cached hashes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.seen.len()).unwrap_or(0)
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn current_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

impl Default for TimeBoundedDedupeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupeStore for TimeBoundedDedupeCache {
    fn check_and_record(&self, envelope_hash: &str, timestamp: u64) -> Result<(), DedupeError> {
        let now = Self::current_millis();

        // Timestamp window check comes first: it bounds everything the
        // cache has to remember.
        let min_valid = now.saturating_sub(Self::MAX_AGE_MS);
        let max_valid = now.saturating_add(Self::MAX_FUTURE_SKEW_MS);

        if timestamp < min_valid {
            return Err(DedupeError::MessageTooOld {
                timestamp,
                threshold: min_valid,
            });
        }
        if timestamp > max_valid {
            return Err(DedupeError::MessageFromFuture {
                timestamp,
                threshold: max_valid,
            });
        }

        let Ok(mut state) = self.state.lock() else {
            return Ok(());
        };

        if now.saturating_sub(state.last_gc) > self.gc_interval_ms {
            let expiry = now.saturating_sub(self.validity_window_ms);
            state.seen.retain(|_, &mut ts| ts > expiry);
            state.last_gc = now;
        }

        if state.seen.contains_key(envelope_hash) {
            return Err(DedupeError::DuplicateEnvelope {
                envelope_hash: envelope_hash.to_string(),
            });
        }

        state.seen.insert(envelope_hash.to_string(), timestamp);
        Ok(())
    }

    fn contains(&self, envelope_hash: &str) -> bool {
        self.state
            .lock()
            .map(|s| s.seen.contains_key(envelope_hash))
            .unwrap_or(false)
    }
}

/// Handler wrapper that acknowledges duplicate deliveries without
/// re-running the inner handler's side effects.
///
/// Timestamp-window rejections are NOT treated as duplicates; they fall
/// through to the inner handler, which keeps stale-clock messages from
/// being silently dropped.
pub struct DedupingHandler {
    inner: Arc<dyn MessageHandler>,
    store: Arc<dyn DedupeStore>,
}

impl DedupingHandler {
    /// Wrap a handler with a dedupe store.
    #[must_use]
    pub fn new(inner: Arc<dyn MessageHandler>, store: Arc<dyn DedupeStore>) -> Self {
        Self { inner, store }
    }
}

#[async_trait]
impl MessageHandler for DedupingHandler {
    async fn handle(&self, msg: Message) -> Result<(), HandlerError> {
        match self.store.check_and_record(&msg.envelope_hash, msg.timestamp) {
            Err(DedupeError::DuplicateEnvelope { envelope_hash }) => {
                debug!(
                    message_id = %msg.id,
                    envelope_hash = %envelope_hash,
                    "Duplicate delivery suppressed"
                );
                Ok(())
            }
            // Outside the window the cache cannot vouch either way.
            Ok(()) | Err(_) => self.inner.handle(msg).await,
        }
    }
}
