//! Trace context propagation through the message envelope.
//!
//! When a message crosses agent boundaries, trace context rides in the
//! envelope's `trace_id`/`span_id` fields:
//!
//! 1. The producer injects its active trace before sealing the message.
//! 2. The consumer extracts the context and parents its spans on it.
//! 3. Absent or malformed fields synthesize a new root trace, and that
//!    synthesis is recorded as a log line, never silently.

use mesh_envelope::Message;
use opentelemetry::trace::{SpanId, TraceId};
use rand::Rng;
use tracing::info;

/// A trace/span identifier pair that can cross process boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    /// Trace identifier (32 hex characters on the wire).
    pub trace_id: TraceId,
    /// Span identifier (16 hex characters on the wire).
    pub span_id: SpanId,
}

impl TraceContext {
    /// An invalid (all-zero) context.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            trace_id: TraceId::INVALID,
            span_id: SpanId::INVALID,
        }
    }

    /// A fresh root trace with random identifiers.
    #[must_use]
    pub fn new_root() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            trace_id: TraceId::from_bytes(rng.gen()),
            span_id: SpanId::from_bytes(rng.gen()),
        }
    }

    /// A child context: same trace, fresh span.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: SpanId::from_bytes(rand::thread_rng().gen()),
        }
    }

    /// True when both identifiers are non-zero.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.trace_id != TraceId::INVALID && self.span_id != SpanId::INVALID
    }
}

/// Write the active trace identifiers into the envelope, if the context
/// holds a valid trace. Must run before the message is sealed; mutating
/// a sealed envelope invalidates its hash.
pub fn inject_trace_context(ctx: &TraceContext, msg: &mut Message) {
    if !ctx.is_valid() {
        return;
    }
    msg.trace_id = ctx.trace_id.to_string();
    msg.span_id = ctx.span_id.to_string();
}

/// Reconstruct a traced context from the envelope, or synthesize a new
/// root trace (recorded as a log line) when the fields are absent or
/// malformed.
#[must_use]
pub fn extract_trace_context(msg: &Message) -> TraceContext {
    let trace_id = TraceId::from_hex(&msg.trace_id).unwrap_or(TraceId::INVALID);
    let span_id = SpanId::from_hex(&msg.span_id).unwrap_or(SpanId::INVALID);

    let ctx = TraceContext { trace_id, span_id };
    if ctx.is_valid() {
        return ctx;
    }

    let root = TraceContext::new_root();
    info!(
        message_id = %msg.id,
        trace_id = %root.trace_id,
        "Message carried no valid trace context, synthesized root trace"
    );
    root
}
