//! # Canonical JSON Encoding
//!
//! Byte-stable, whitespace-free encoding used as the hash input for
//! envelopes. Two semantically-identical values always canonicalize to
//! identical bytes regardless of key insertion order or array ordering.
//!
//! Rules:
//!
//! - Object keys are sorted lexicographically at every nesting level.
//! - Arrays are treated as order-insensitive sets: elements are sorted by
//!   their own canonical encoding. Wire documents keep producer order;
//!   only the hash input is normalized.
//! - Encoding is compact JSON (no whitespace).

use crate::errors::CodecError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Recursively normalize a value into its canonical form.
#[must_use]
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            // Sort keys through an explicit BTreeMap rather than relying
            // on serde_json's Map backing, which flips to
            // insertion-ordered if any crate in the build enables the
            // `preserve_order` feature.
            let mut sorted: BTreeMap<&str, Value> = BTreeMap::new();
            for (key, val) in map {
                sorted.insert(key, canonicalize(val));
            }
            let mut out = Map::with_capacity(sorted.len());
            for (key, val) in sorted {
                out.insert(key.to_string(), val);
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let mut encoded: Vec<(Vec<u8>, Value)> = items
                .iter()
                .map(|item| {
                    let canonical = canonicalize(item);
                    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
                    (bytes, canonical)
                })
                .collect();
            encoded.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Array(encoded.into_iter().map(|(_, v)| v).collect())
        }
        other => other.clone(),
    }
}

/// Canonical compact encoding of a value.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be encoded
/// (non-string map keys, non-finite floats injected via raw values).
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, CodecError> {
    let canonical = canonicalize(value);
    Ok(serde_json::to_vec(&canonical)?)
}
