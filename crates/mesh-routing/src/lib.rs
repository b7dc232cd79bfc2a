//! # Mesh Routing - Tenant Subject Taxonomy
//!
//! Builds, validates, and enforces tenant-scoped routing subjects so that
//! cross-tenant isolation holds at the transport layer, not just in
//! application logic.
//!
//! ## Subject Shape
//!
//! ```text
//! <tenant_id>.<category>.<...path>.<direction>
//!
//! acme.workflows.wf-42.in      workflow inbox
//! acme.agents.agent-7.out      agent outbox
//! acme.tools.calls             tool invocations
//! acme.system.health           health channel
//! ```
//!
//! Every subject used for tenant-owned traffic begins with exactly one
//! tenant-id segment. A subject lacking this prefix, or whose prefix does
//! not match the caller's [`TenantContext`], is rejected before reaching
//! the broker.
//!
//! ## Trust Boundary
//!
//! Builders take trusted internal identifiers; malformed input there is a
//! programming error (`debug_assert!`). Validators run on untrusted or
//! cross-boundary input and always return errors, never panic.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod context;
pub mod errors;
pub mod subjects;
pub mod validate;

// Re-export main types
pub use context::TenantContext;
pub use errors::RoutingError;
pub use subjects::{
    agent_in, agent_in_ctx, agent_out, agent_out_ctx, agents_wildcard, ensure_tenant_prefix,
    strip_tenant_prefix, system_control, system_control_ctx, system_health, system_health_ctx,
    system_wildcard, tenant_wildcard, tools_audit, tools_audit_ctx, tools_calls, tools_calls_ctx,
    tools_wildcard, workflow_in, workflow_in_ctx, workflow_out, workflow_out_ctx,
    workflows_wildcard,
};
pub use validate::{
    extract_tenant_from_subject, filter_subjects_by_tenant, validate_subject_tenant_access,
    validate_tenant_subject,
};

/// Subject categories recognized by the router.
pub const CATEGORIES: &[&str] = &["workflows", "agents", "tools", "system"];

/// Minimum segment count for an entity-scoped tenant subject
/// (`tenant.category.entity.direction`). Flat `tools` and `system`
/// channels are three segments.
pub const MIN_SUBJECT_SEGMENTS: usize = 4;
