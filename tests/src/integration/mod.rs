//! Cross-crate integration tests.

pub mod delivery;
pub mod envelope_determinism;
pub mod latency;
pub mod tenant_isolation;
