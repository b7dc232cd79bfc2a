//! # Subject Builders
//!
//! One builder per category/direction pair, context-resolving variants,
//! wildcard patterns for subscriptions, and idempotent migration helpers
//! for legacy (non-tenant-scoped) subjects.
//!
//! Builders are called with trusted internal identifiers; a malformed
//! segment is a programming error and trips a `debug_assert!`. Validation
//! of untrusted subjects lives in [`crate::validate`].

use crate::context::TenantContext;
use crate::errors::RoutingError;
use crate::CATEGORIES;

/// True when a string is usable as a single subject segment.
fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains(['.', '*', '>']) && !segment.contains(char::is_whitespace)
}

fn assert_segment(segment: &str, role: &str) {
    debug_assert!(
        is_valid_segment(segment),
        "invalid {role} segment: {segment:?}"
    );
    let _ = role;
}

fn resolve_tenant(ctx: Option<&TenantContext>) -> Result<&str, RoutingError> {
    ctx.map(|c| c.tenant_id.as_str())
        .filter(|id| !id.is_empty())
        .ok_or(RoutingError::MissingTenantContext)
}

// =============================================================================
// WORKFLOW SUBJECTS
// =============================================================================

/// `<tenant>.workflows.<workflow>.in` - workflow inbox.
#[must_use]
pub fn workflow_in(tenant_id: &str, workflow_id: &str) -> String {
    assert_segment(tenant_id, "tenant");
    assert_segment(workflow_id, "workflow");
    format!("{tenant_id}.workflows.{workflow_id}.in")
}

/// `<tenant>.workflows.<workflow>.out` - workflow outbox.
#[must_use]
pub fn workflow_out(tenant_id: &str, workflow_id: &str) -> String {
    assert_segment(tenant_id, "tenant");
    assert_segment(workflow_id, "workflow");
    format!("{tenant_id}.workflows.{workflow_id}.out")
}

/// Workflow inbox resolved from the ambient tenant context.
///
/// # Errors
///
/// `RoutingError::MissingTenantContext` when no context is present.
pub fn workflow_in_ctx(
    ctx: Option<&TenantContext>,
    workflow_id: &str,
) -> Result<String, RoutingError> {
    Ok(workflow_in(resolve_tenant(ctx)?, workflow_id))
}

/// Workflow outbox resolved from the ambient tenant context.
///
/// # Errors
///
/// `RoutingError::MissingTenantContext` when no context is present.
pub fn workflow_out_ctx(
    ctx: Option<&TenantContext>,
    workflow_id: &str,
) -> Result<String, RoutingError> {
    Ok(workflow_out(resolve_tenant(ctx)?, workflow_id))
}

// =============================================================================
// AGENT SUBJECTS
// =============================================================================

/// `<tenant>.agents.<agent>.in` - agent inbox.
#[must_use]
pub fn agent_in(tenant_id: &str, agent_id: &str) -> String {
    assert_segment(tenant_id, "tenant");
    assert_segment(agent_id, "agent");
    format!("{tenant_id}.agents.{agent_id}.in")
}

/// `<tenant>.agents.<agent>.out` - agent outbox.
#[must_use]
pub fn agent_out(tenant_id: &str, agent_id: &str) -> String {
    assert_segment(tenant_id, "tenant");
    assert_segment(agent_id, "agent");
    format!("{tenant_id}.agents.{agent_id}.out")
}

/// Agent inbox resolved from the ambient tenant context.
///
/// # Errors
///
/// `RoutingError::MissingTenantContext` when no context is present.
pub fn agent_in_ctx(ctx: Option<&TenantContext>, agent_id: &str) -> Result<String, RoutingError> {
    Ok(agent_in(resolve_tenant(ctx)?, agent_id))
}

/// Agent outbox resolved from the ambient tenant context.
///
/// # Errors
///
/// `RoutingError::MissingTenantContext` when no context is present.
pub fn agent_out_ctx(ctx: Option<&TenantContext>, agent_id: &str) -> Result<String, RoutingError> {
    Ok(agent_out(resolve_tenant(ctx)?, agent_id))
}

// =============================================================================
// TOOL SUBJECTS
// =============================================================================

/// `<tenant>.tools.calls` - tool invocation channel.
#[must_use]
pub fn tools_calls(tenant_id: &str) -> String {
    assert_segment(tenant_id, "tenant");
    format!("{tenant_id}.tools.calls")
}

/// `<tenant>.tools.audit` - tool audit channel.
#[must_use]
pub fn tools_audit(tenant_id: &str) -> String {
    assert_segment(tenant_id, "tenant");
    format!("{tenant_id}.tools.audit")
}

/// Tool invocation channel resolved from the ambient tenant context.
///
/// # Errors
///
/// `RoutingError::MissingTenantContext` when no context is present.
pub fn tools_calls_ctx(ctx: Option<&TenantContext>) -> Result<String, RoutingError> {
    Ok(tools_calls(resolve_tenant(ctx)?))
}

/// Tool audit channel resolved from the ambient tenant context.
///
/// # Errors
///
/// `RoutingError::MissingTenantContext` when no context is present.
pub fn tools_audit_ctx(ctx: Option<&TenantContext>) -> Result<String, RoutingError> {
    Ok(tools_audit(resolve_tenant(ctx)?))
}

// =============================================================================
// SYSTEM SUBJECTS
// =============================================================================

/// `<tenant>.system.control` - control-plane channel.
#[must_use]
pub fn system_control(tenant_id: &str) -> String {
    assert_segment(tenant_id, "tenant");
    format!("{tenant_id}.system.control")
}

/// `<tenant>.system.health` - health channel.
#[must_use]
pub fn system_health(tenant_id: &str) -> String {
    assert_segment(tenant_id, "tenant");
    format!("{tenant_id}.system.health")
}

/// Control-plane channel resolved from the ambient tenant context.
///
/// # Errors
///
/// `RoutingError::MissingTenantContext` when no context is present.
pub fn system_control_ctx(ctx: Option<&TenantContext>) -> Result<String, RoutingError> {
    Ok(system_control(resolve_tenant(ctx)?))
}

/// Health channel resolved from the ambient tenant context.
///
/// # Errors
///
/// `RoutingError::MissingTenantContext` when no context is present.
pub fn system_health_ctx(ctx: Option<&TenantContext>) -> Result<String, RoutingError> {
    Ok(system_health(resolve_tenant(ctx)?))
}

// =============================================================================
// WILDCARD PATTERNS (subscriptions)
// =============================================================================

/// All workflow traffic for a tenant: `<tenant>.workflows.>`.
#[must_use]
pub fn workflows_wildcard(tenant_id: &str) -> String {
    assert_segment(tenant_id, "tenant");
    format!("{tenant_id}.workflows.>")
}

/// All agent traffic for a tenant: `<tenant>.agents.>`.
#[must_use]
pub fn agents_wildcard(tenant_id: &str) -> String {
    assert_segment(tenant_id, "tenant");
    format!("{tenant_id}.agents.>")
}

/// All tool traffic for a tenant: `<tenant>.tools.>`.
#[must_use]
pub fn tools_wildcard(tenant_id: &str) -> String {
    assert_segment(tenant_id, "tenant");
    format!("{tenant_id}.tools.>")
}

/// All system traffic for a tenant: `<tenant>.system.>`.
#[must_use]
pub fn system_wildcard(tenant_id: &str) -> String {
    assert_segment(tenant_id, "tenant");
    format!("{tenant_id}.system.>")
}

/// Everything a tenant can see: `<tenant>.>`.
#[must_use]
pub fn tenant_wildcard(tenant_id: &str) -> String {
    assert_segment(tenant_id, "tenant");
    format!("{tenant_id}.>")
}

// =============================================================================
// MIGRATION HELPERS (legacy subjects)
// =============================================================================

/// Prefix a legacy (non-tenant-scoped) subject with a tenant id.
///
/// Idempotent: a subject that is already tenant-scoped (its first
/// segment is not a known category) is returned unchanged.
#[must_use]
pub fn ensure_tenant_prefix(tenant_id: &str, subject: &str) -> String {
    assert_segment(tenant_id, "tenant");
    let first = subject.split('.').next().unwrap_or("");
    if CATEGORIES.contains(&first) {
        format!("{tenant_id}.{subject}")
    } else {
        subject.to_string()
    }
}

/// Strip the tenant prefix from a tenant-scoped subject, recovering the
/// legacy form. The inverse of [`ensure_tenant_prefix`]; a subject that
/// is already legacy (first segment is a known category) is returned
/// unchanged.
#[must_use]
pub fn strip_tenant_prefix(subject: &str) -> String {
    let mut segments = subject.splitn(2, '.');
    let first = segments.next().unwrap_or("");
    let rest = segments.next().unwrap_or("");
    if CATEGORIES.contains(&first) {
        return subject.to_string();
    }
    let rest_first = rest.split('.').next().unwrap_or("");
    if CATEGORIES.contains(&rest_first) {
        rest.to_string()
    } else {
        subject.to_string()
    }
}
