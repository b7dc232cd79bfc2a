//! # Mesh Envelope - Message Model and Canonical Codec
//!
//! The universal envelope for ALL traffic on the agent mesh, plus the
//! deterministic codec that makes envelopes tamper-evident.
//!
//! ## Envelope Rules
//!
//! - Every message carries an `envelope_hash`: lowercase-hex SHA-256 over
//!   the canonical form of every other field.
//! - The hash input is independent of key or array ordering, so two
//!   semantically-identical messages always produce bit-identical digests.
//! - A message is immutable once sealed. Mutating any field invalidates
//!   the hash; producers must build a new message instead.
//!
//! ## Canonical Form
//!
//! Object keys are sorted recursively; arrays are sorted by the canonical
//! encoding of their elements; the encoding is compact JSON with no
//! whitespace. `envelope_hash` is never part of its own hash input.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod canonical;
pub mod codec;
pub mod errors;
pub mod message;
pub mod schema;

// Re-export main types
pub use canonical::{canonical_bytes, canonicalize};
pub use codec::{CanonicalCodec, EnvelopeCodec, EnvelopeHasher, Sha256Hasher};
pub use errors::CodecError;
pub use message::{Cost, Message, MessageType};
pub use schema::{SCHEMA_VERSION, REQUIRED_FIELDS};

/// Length of a lowercase-hex SHA-256 digest.
pub const ENVELOPE_HASH_LEN: usize = 64;
