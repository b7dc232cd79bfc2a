//! # Mesh Telemetry
//!
//! Distributed-trace propagation through the message envelope and
//! correlation-enriched structured logging.
//!
//! ## Components
//!
//! - **Trace propagation**: inject/extract `trace_id`/`span_id` between
//!   the active trace and the envelope; synthesized root traces are
//!   always logged, never silent.
//! - **Correlated logger**: wraps the `tracing` backbone and merges a
//!   fixed set of correlation fields into every entry, with reserved
//!   field names enforced.
//! - **Configuration**: environment-driven, with console/JSON toggles.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MESH_SERVICE_NAME` | `agent-mesh` | Service name in logs |
//! | `MESH_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `MESH_JSON_LOGS` | `false` | Emit JSON-formatted entries |
//! | `MESH_CONSOLE_OUTPUT` | `true` | Console output (development) |

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod correlate;
pub mod trace;

// Re-export main types
pub use config::TelemetryConfig;
pub use correlate::{CorrelatedLogger, RESERVED_FIELDS};
pub use trace::{extract_trace_context, inject_trace_context, TraceContext};

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Telemetry errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    /// A caller-provided log field violated field governance.
    #[error("Invalid log field '{field}': {reason}")]
    FieldValidation {
        /// The offending field key.
        field: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Logging initialization failed.
    #[error("Failed to initialize logging: {0}")]
    Init(String),
}

/// Handle returned by [`init_logging`]; hold it for the lifetime of the
/// application.
pub struct LoggingGuard {
    _initialized: bool,
}

/// Install the global `tracing` subscriber per the configuration.
///
/// # Errors
///
/// `TelemetryError::Init` when the filter is malformed or a subscriber
/// is already installed.
pub fn init_logging(config: &TelemetryConfig) -> Result<LoggingGuard, TelemetryError> {
    let filter =
        EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::Init(e.to_string()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.console_output);

    let result = if config.json_logs {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing::debug!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Structured logging initialized"
    );
    Ok(LoggingGuard { _initialized: true })
}
