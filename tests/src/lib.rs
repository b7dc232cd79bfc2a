//! # Agent-Mesh Test Suite
//!
//! Unified test crate containing cross-crate integration tests.
//!
//! ## Structure
//!
//! ```text
//! tests/src/integration/
//! ├── envelope_determinism.rs  # Hash stability and tamper detection
//! ├── tenant_isolation.rs      # Cross-tenant routing boundaries
//! ├── delivery.rs              # Redelivery, dead letters, replay, dedupe
//! ├── correlated_logging.rs    # Structured log entry construction
//! └── latency.rs               # End-to-end ping-pong latency
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p mesh-tests
//!
//! # By area
//! cargo test -p mesh-tests integration::envelope_determinism::
//! cargo test -p mesh-tests integration::delivery::
//! ```

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
