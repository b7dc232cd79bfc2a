//! Durable log storage and subject matching.

use mesh_envelope::Message;
use std::sync::RwLock;

/// One entry in the durable log.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// Monotonic stream sequence, assigned at publish time.
    pub seq: u64,
    /// The subject the message was published on.
    pub subject: String,
    /// The envelope, exactly as published.
    pub message: Message,
    /// Publish time, epoch milliseconds.
    pub published_at: u64,
    /// Serialized envelope size, charged against the stream byte cap.
    pub size_bytes: usize,
}

/// Append-only in-process log. Sequence order is publish order.
#[derive(Debug, Default)]
pub struct DurableLog {
    entries: RwLock<Vec<StoredEntry>>,
}

impl DurableLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn append(&self, entry: StoredEntry) {
        if let Ok(mut entries) = self.entries.write() {
            entries.push(entry);
        }
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// True when nothing has been published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enforce retention caps: drop entries older than `max_age_ms`
    /// relative to `now`, then drop oldest-first until the total stored
    /// bytes fit under `max_bytes`. Called after every append.
    pub fn prune(&self, max_age_ms: u64, max_bytes: u64, now: u64) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };

        let cutoff = now.saturating_sub(max_age_ms);
        entries.retain(|e| e.published_at >= cutoff);

        let mut total: u64 = entries.iter().map(|e| e.size_bytes as u64).sum();
        let mut over = 0;
        for entry in entries.iter() {
            if total <= max_bytes {
                break;
            }
            total -= entry.size_bytes as u64;
            over += 1;
        }
        if over > 0 {
            entries.drain(..over);
        }
    }

    /// Snapshot of all entries matching a predicate, in sequence order.
    pub fn select<F>(&self, mut predicate: F) -> Vec<StoredEntry>
    where
        F: FnMut(&StoredEntry) -> bool,
    {
        self.entries
            .read()
            .map(|entries| entries.iter().filter(|e| predicate(e)).cloned().collect())
            .unwrap_or_default()
    }
}

/// Match a concrete subject against a filter pattern.
///
/// Filters use the broker wildcard grammar: `*` matches exactly one
/// segment, `>` matches one or more trailing segments.
#[must_use]
pub fn subject_matches(filter: &str, subject: &str) -> bool {
    let mut filter_segments = filter.split('.');
    let mut subject_segments = subject.split('.');

    loop {
        match (filter_segments.next(), subject_segments.next()) {
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => {}
            (Some(f), Some(s)) if f == s => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
