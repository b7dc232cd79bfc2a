//! Codec error taxonomy.

use thiserror::Error;

/// Errors from envelope serialization, deserialization, and hashing.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The codec failed to encode or decode the envelope.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The recomputed hash does not match the embedded `envelope_hash`.
    ///
    /// Never auto-corrected; the message is rejected and the event is
    /// recorded for audit.
    #[error("Envelope hash mismatch for message {message_id}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Id of the rejected message.
        message_id: String,
        /// The hash embedded in the envelope.
        expected: String,
        /// The hash recomputed from the envelope fields.
        actual: String,
    },

    /// A field required by the active schema version is missing.
    #[error("Schema violation: required field '{field}' is missing (schema v{version})")]
    Schema {
        /// Name of the missing required field.
        field: &'static str,
        /// The active schema version.
        version: u16,
    },

    /// The envelope is structurally ineligible (e.g. not a JSON object).
    #[error("Invalid envelope: {0}")]
    Validation(String),
}
