//! Correlated structured logging.
//!
//! A [`CorrelatedLogger`] carries a fixed set of correlation fields that
//! are merged into every subsequent entry. Builder methods return a new
//! logger; the original is untouched, so a request-scoped logger can
//! fan out to per-message children.
//!
//! Every entry is a single flat JSON object. Field ordering is
//! deterministic for a given input map (sorted), though that ordering is
//! not part of the external contract beyond being stable across
//! repeated calls with identical input.

use crate::trace::TraceContext;
use crate::TelemetryError;
use mesh_envelope::{message::now_millis, Message};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Field names owned by the logging layer. Rejected when supplied as
/// caller-provided custom fields; never silently overridden.
pub const RESERVED_FIELDS: &[&str] = &[
    "trace_id",
    "span_id",
    "message_id",
    "workflow_id",
    "agent_id",
    "timestamp",
    "level",
    "message",
];

/// A structured logger carrying fixed correlation fields.
#[derive(Debug, Clone, Default)]
pub struct CorrelatedLogger {
    fields: BTreeMap<String, Value>,
}

impl CorrelatedLogger {
    /// Logger with no fixed fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Child logger correlated with a message: its id and any trace
    /// identifiers the envelope carries.
    #[must_use]
    pub fn with_message(&self, msg: &Message) -> Self {
        let mut next = self.clone();
        next.fields
            .insert("message_id".to_string(), Value::String(msg.id.to_string()));
        if !msg.trace_id.is_empty() {
            next.fields
                .insert("trace_id".to_string(), Value::String(msg.trace_id.clone()));
        }
        if !msg.span_id.is_empty() {
            next.fields
                .insert("span_id".to_string(), Value::String(msg.span_id.clone()));
        }
        next
    }

    /// Child logger correlated with a workflow.
    #[must_use]
    pub fn with_workflow(&self, workflow_id: &str) -> Self {
        let mut next = self.clone();
        next.fields.insert(
            "workflow_id".to_string(),
            Value::String(workflow_id.to_string()),
        );
        next
    }

    /// Child logger correlated with an agent.
    #[must_use]
    pub fn with_agent(&self, agent_id: &str) -> Self {
        let mut next = self.clone();
        next.fields
            .insert("agent_id".to_string(), Value::String(agent_id.to_string()));
        next
    }

    /// Child logger carrying explicit trace identifiers.
    #[must_use]
    pub fn with_trace(&self, ctx: &TraceContext) -> Self {
        let mut next = self.clone();
        next.fields.insert(
            "trace_id".to_string(),
            Value::String(ctx.trace_id.to_string()),
        );
        next.fields
            .insert("span_id".to_string(), Value::String(ctx.span_id.to_string()));
        next
    }

    /// Child logger with caller-provided custom fields.
    ///
    /// # Errors
    ///
    /// `TelemetryError::FieldValidation` when a key is reserved, empty,
    /// or whitespace-only. Nothing is merged on error.
    pub fn with_fields(
        &self,
        fields: BTreeMap<String, Value>,
    ) -> Result<Self, TelemetryError> {
        for key in fields.keys() {
            if key.trim().is_empty() {
                return Err(TelemetryError::FieldValidation {
                    field: key.clone(),
                    reason: "field key is empty or whitespace-only".to_string(),
                });
            }
            if RESERVED_FIELDS.contains(&key.as_str()) {
                return Err(TelemetryError::FieldValidation {
                    field: key.clone(),
                    reason: "field name is reserved".to_string(),
                });
            }
        }

        let mut next = self.clone();
        next.fields.extend(fields);
        Ok(next)
    }

    /// The fixed fields this logger carries.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Build the flat entry object for a level and message. Sorted key
    /// order, single object, no nesting added by the logger.
    #[must_use]
    pub fn entry(&self, level: &str, message: &str) -> Value {
        let mut map = Map::new();
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        map.insert("timestamp".to_string(), Value::from(now_millis()));
        map.insert("level".to_string(), Value::String(level.to_string()));
        map.insert("message".to_string(), Value::String(message.to_string()));
        Value::Object(map)
    }

    /// Emit at info level.
    pub fn info(&self, message: &str) {
        tracing::info!(target: "mesh", entry = %self.entry("info", message), "{message}");
    }

    /// Emit at warn level.
    pub fn warn(&self, message: &str) {
        tracing::warn!(target: "mesh", entry = %self.entry("warn", message), "{message}");
    }

    /// Emit at error level.
    pub fn error(&self, message: &str) {
        tracing::error!(target: "mesh", entry = %self.entry("error", message), "{message}");
    }

    /// Emit at debug level.
    pub fn debug(&self, message: &str) {
        tracing::debug!(target: "mesh", entry = %self.entry("debug", message), "{message}");
    }
}
