//! # Message Envelope
//!
//! The universal wrapper for all mesh traffic.
//!
//! ## Envelope Properties
//!
//! - **Sortable identity**: `id` is a UUIDv7, so ids sort in creation order.
//! - **Trace continuity**: `trace_id`/`span_id` carry the distributed trace
//!   across process boundaries.
//! - **Tamper evidence**: `envelope_hash` covers every other field.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// The closed set of message kinds on the mesh.
///
/// Kept as a tagged variant (not open strings) so every dispatch point is
/// exhaustive and new kinds are compile-time-checked additions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// A request expecting a correlated response.
    Request,
    /// A response to a prior request.
    Response,
    /// A fire-and-forget notification.
    Event,
    /// A control-plane instruction (pause, resume, shutdown, ...).
    Control,
}

impl MessageType {
    /// Wire name of this message type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Event => "event",
            Self::Control => "control",
        }
    }
}

/// Token and dollar counters accumulated by the message's producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    /// Tokens consumed producing this message.
    pub tokens: u64,
    /// Dollar cost attributed to this message.
    pub dollars: f64,
}

impl Cost {
    /// True when no cost has been recorded.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.tokens == 0 && self.dollars == 0.0
    }
}

/// The message envelope exchanged between agents, control components,
/// and tools.
///
/// # Immutability
///
/// Once `envelope_hash` is set (see [`crate::EnvelopeCodec`]), the message
/// MUST NOT be mutated. Any field change invalidates the hash and must
/// produce a new message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    // =========================================================================
    // IDENTITY SECTION
    // =========================================================================
    /// Globally unique, monotonic-sortable identifier (UUIDv7).
    pub id: Uuid,

    /// Distributed trace identifier (32 lowercase hex characters),
    /// empty until trace context is injected.
    #[serde(default)]
    pub trace_id: String,

    /// Span identifier within the trace (16 lowercase hex characters),
    /// empty until trace context is injected.
    #[serde(default)]
    pub span_id: String,

    // =========================================================================
    // ROUTING SECTION
    // =========================================================================
    /// Sender agent or component id.
    pub from: String,

    /// Recipient agent id or topic.
    pub to: String,

    /// Message kind. Exhaustively matched at every dispatch point.
    #[serde(rename = "type")]
    pub message_type: MessageType,

    // =========================================================================
    // PAYLOAD SECTION
    // =========================================================================
    /// Opaque structured payload.
    pub payload: serde_json::Value,

    /// Open key/value map carrying workflow context. Sorted map so the
    /// wire form is stable.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Token/dollar counters. Omitted from the wire (and the hash input)
    /// when zero, so producers that never set it stay hash-compatible.
    #[serde(default, skip_serializing_if = "Cost::is_zero")]
    pub cost: Cost,

    /// UTC creation time, epoch milliseconds.
    pub timestamp: u64,

    // =========================================================================
    // INTEGRITY SECTION
    // =========================================================================
    /// Lowercase-hex SHA-256 over the canonical form of all other fields.
    /// Never part of its own hash input. Empty until the message is sealed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub envelope_hash: String,
}

impl Message {
    /// Create an unsealed message with a fresh sortable id and the
    /// current UTC timestamp.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        message_type: MessageType,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            trace_id: String::new(),
            span_id: String::new(),
            from: from.into(),
            to: to.into(),
            message_type,
            payload,
            metadata: BTreeMap::new(),
            cost: Cost::default(),
            timestamp: now_millis(),
            envelope_hash: String::new(),
        }
    }

    /// Attach a metadata entry. Only valid before sealing.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Attach cost counters. Only valid before sealing.
    #[must_use]
    pub fn with_cost(mut self, cost: Cost) -> Self {
        self.cost = cost;
        self
    }

    /// True once an envelope hash has been embedded.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        !self.envelope_hash.is_empty()
    }

    /// The workflow this message belongs to, when the producer recorded
    /// one under the conventional `workflow_id` metadata key.
    #[must_use]
    pub fn workflow_id(&self) -> Option<&str> {
        self.metadata.get("workflow_id").and_then(|v| v.as_str())
    }
}

/// Current UTC time as epoch milliseconds.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
