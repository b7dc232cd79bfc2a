//! Routing error taxonomy.

use thiserror::Error;

/// Errors from subject construction, validation, and access checks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// A context-resolving builder was called without an ambient
    /// tenant context.
    #[error("No tenant context available to resolve subject")]
    MissingTenantContext,

    /// The subject's tenant prefix does not match the caller's tenant.
    #[error("Cross-tenant access denied: subject belongs to tenant '{subject_tenant}', caller is tenant '{caller_tenant}'")]
    CrossTenantAccessDenied {
        /// Tenant owning the subject.
        subject_tenant: String,
        /// Tenant of the caller's context.
        caller_tenant: String,
    },

    /// The subject is malformed (wrong segment count, empty segments,
    /// missing tenant prefix).
    #[error("Invalid subject '{subject}': {reason}")]
    InvalidSubject {
        /// The offending subject.
        subject: String,
        /// Why it was rejected.
        reason: String,
    },
}
