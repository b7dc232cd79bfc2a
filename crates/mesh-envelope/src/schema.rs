//! Envelope schema versioning.
//!
//! Deserialization validates the required-field set of the active schema
//! version. Unknown additive fields are tolerated for forward
//! compatibility; missing required fields are a `SchemaError`.

use crate::errors::CodecError;
use serde_json::Value;

/// The active envelope schema version.
pub const SCHEMA_VERSION: u16 = 1;

/// Fields every v1 envelope must carry.
pub const REQUIRED_FIELDS: &[&str] = &[
    "id",
    "from",
    "to",
    "type",
    "payload",
    "timestamp",
];

/// Optional fields tolerated (and hash-neutral when unset).
pub const OPTIONAL_FIELDS: &[&str] = &[
    "trace_id",
    "span_id",
    "metadata",
    "cost",
    "envelope_hash",
];

/// Validate a raw envelope document against the active schema version.
///
/// # Errors
///
/// - `CodecError::Validation` if the document is not a JSON object.
/// - `CodecError::Schema` naming the first missing required field.
pub fn validate_document(doc: &Value) -> Result<(), CodecError> {
    let Some(map) = doc.as_object() else {
        return Err(CodecError::Validation(
            "envelope must be a JSON object".to_string(),
        ));
    };

    for field in REQUIRED_FIELDS {
        if !map.contains_key(*field) {
            return Err(CodecError::Schema {
                field,
                version: SCHEMA_VERSION,
            });
        }
    }

    Ok(())
}
