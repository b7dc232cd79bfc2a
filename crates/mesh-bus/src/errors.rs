//! Bus error taxonomy.

use mesh_routing::RoutingError;
use std::time::Duration;
use thiserror::Error;

/// Errors from publish/subscribe/replay operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The broker is unreachable or the connection was lost.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An ack-wait or caller-supplied budget elapsed.
    #[error("Timed out after {waited:?} during {operation}")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// How long the caller waited.
        waited: Duration,
    },

    /// The caller's context or deadline was cancelled mid-flight.
    #[error("Operation cancelled: {0}")]
    Cancelled(&'static str),

    /// Routing-layer rejection (tenant isolation, malformed subject).
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// The message is ineligible for publication (e.g. not sealed).
    #[error("Invalid message: {0}")]
    Validation(String),
}
