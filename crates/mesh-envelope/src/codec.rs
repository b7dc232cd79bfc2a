//! # Canonical Envelope Codec
//!
//! Serialization, deserialization, hashing, and hash validation for the
//! message envelope. The hash algorithm sits behind [`EnvelopeHasher`] so
//! alternate digests can be injected without touching call sites.

use crate::canonical::canonical_bytes;
use crate::errors::CodecError;
use crate::message::Message;
use crate::schema;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Digest provider for envelope hashing.
pub trait EnvelopeHasher: Send + Sync {
    /// Hash the canonical bytes, returning a lowercase-hex digest.
    fn digest(&self, bytes: &[u8]) -> String;
}

/// SHA-256 hasher, the mesh default.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl EnvelopeHasher for Sha256Hasher {
    fn digest(&self, bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }
}

/// Codec interface for the envelope. Implementations must be
/// deterministic: identical messages encode to identical bytes.
pub trait EnvelopeCodec: Send + Sync {
    /// Encode a message to its wire form.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Serialization` on encoding failure.
    fn serialize(&self, msg: &Message) -> Result<Vec<u8>, CodecError>;

    /// Decode a message from its wire form, validating the active schema.
    ///
    /// # Errors
    ///
    /// - `CodecError::Serialization` on malformed bytes.
    /// - `CodecError::Schema` on a missing required field.
    fn deserialize(&self, bytes: &[u8]) -> Result<Message, CodecError>;

    /// Compute the envelope hash over all fields except `envelope_hash`.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Serialization` on encoding failure.
    fn compute_hash(&self, msg: &Message) -> Result<String, CodecError>;

    /// Recompute the hash and compare it to the embedded one in
    /// constant time.
    ///
    /// # Errors
    ///
    /// - `CodecError::Validation` if the message was never sealed.
    /// - `CodecError::HashMismatch` on tamper or corruption. Never
    ///   silently corrected.
    fn validate_hash(&self, msg: &Message) -> Result<(), CodecError>;
}

/// The canonical codec: compact JSON wire form, order-normalized hash
/// input, pluggable digest.
pub struct CanonicalCodec {
    hasher: Box<dyn EnvelopeHasher>,
}

impl CanonicalCodec {
    /// Codec with the default SHA-256 hasher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hasher: Box::new(Sha256Hasher),
        }
    }

    /// Codec with an injected digest implementation.
    #[must_use]
    pub fn with_hasher(hasher: Box<dyn EnvelopeHasher>) -> Self {
        Self { hasher }
    }

    /// Compute and embed the envelope hash, consuming the unsealed
    /// message and returning the immutable sealed one.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Serialization` on encoding failure.
    pub fn seal(&self, mut msg: Message) -> Result<Message, CodecError> {
        msg.envelope_hash = self.compute_hash(&msg)?;
        Ok(msg)
    }

    fn hash_input(&self, msg: &Message) -> Result<Vec<u8>, CodecError> {
        let mut doc = serde_json::to_value(msg)?;
        if let Value::Object(map) = &mut doc {
            // The hash never covers itself.
            map.remove("envelope_hash");
        }
        canonical_bytes(&doc)
    }
}

impl Default for CanonicalCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeCodec for CanonicalCodec {
    fn serialize(&self, msg: &Message) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(msg)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Message, CodecError> {
        let doc: Value = serde_json::from_slice(bytes)?;
        schema::validate_document(&doc)?;
        Ok(serde_json::from_value(doc)?)
    }

    fn compute_hash(&self, msg: &Message) -> Result<String, CodecError> {
        let input = self.hash_input(msg)?;
        Ok(self.hasher.digest(&input))
    }

    fn validate_hash(&self, msg: &Message) -> Result<(), CodecError> {
        if msg.envelope_hash.is_empty() {
            return Err(CodecError::Validation(
                "message has no envelope hash to validate".to_string(),
            ));
        }

        let actual = self.compute_hash(msg)?;
        if constant_time_eq(msg.envelope_hash.as_bytes(), actual.as_bytes()) {
            Ok(())
        } else {
            Err(CodecError::HashMismatch {
                message_id: msg.id.to_string(),
                expected: msg.envelope_hash.clone(),
                actual,
            })
        }
    }
}

/// Constant-time byte comparison. Folds the XOR of every position so the
/// comparison cost does not depend on where the first difference sits.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
