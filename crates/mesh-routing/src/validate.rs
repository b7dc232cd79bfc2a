//! # Subject Validation and Tenant Access Control
//!
//! Validators run on untrusted or cross-boundary input: they always
//! return errors, never panic. Enforcement happens here, before a
//! subject ever reaches the broker.

use crate::context::TenantContext;
use crate::errors::RoutingError;
use crate::{CATEGORIES, MIN_SUBJECT_SEGMENTS};
use tracing::warn;

/// Validate the shape of a tenant subject: non-empty tenant prefix,
/// known category, no empty segments, and a category-aware segment
/// minimum. `workflows` and `agents` subjects address an entity and
/// carry a direction, so they need at least four segments
/// (`tenant.category.entity.direction`); `tools` and `system` channels
/// are flat and need only three (`tenant.category.channel`).
///
/// # Errors
///
/// `RoutingError::InvalidSubject` describing the first violation.
pub fn validate_tenant_subject(subject: &str) -> Result<(), RoutingError> {
    let segments: Vec<&str> = subject.split('.').collect();

    if segments.len() < 3 {
        return Err(invalid(
            subject,
            format!("expected at least 3 segments, got {}", segments.len()),
        ));
    }

    if segments.iter().any(|s| s.is_empty()) {
        return Err(invalid(subject, "empty segment".to_string()));
    }

    let tenant = segments[0];
    if CATEGORIES.contains(&tenant) {
        return Err(invalid(
            subject,
            format!("missing tenant prefix (leading segment '{tenant}' is a category)"),
        ));
    }

    let category = segments[1];
    if !CATEGORIES.contains(&category) && category != ">" && category != "*" {
        return Err(invalid(
            subject,
            format!("unknown category '{category}'"),
        ));
    }

    // A trailing `>` stands in for the entity and direction segments.
    let has_tail_wildcard = segments.last() == Some(&">");
    if matches!(category, "workflows" | "agents")
        && !has_tail_wildcard
        && segments.len() < MIN_SUBJECT_SEGMENTS
    {
        return Err(invalid(
            subject,
            format!(
                "category '{category}' expects at least {MIN_SUBJECT_SEGMENTS} segments, got {}",
                segments.len()
            ),
        ));
    }

    Ok(())
}

/// Extract the tenant id (leading segment) from a tenant-scoped subject.
///
/// # Errors
///
/// `RoutingError::InvalidSubject` when the subject is empty, has an
/// empty leading segment, or its leading segment is a bare category
/// (i.e. the subject is legacy, not tenant-scoped).
pub fn extract_tenant_from_subject(subject: &str) -> Result<String, RoutingError> {
    let first = subject.split('.').next().unwrap_or("");

    if first.is_empty() {
        return Err(invalid(subject, "empty tenant segment".to_string()));
    }
    if CATEGORIES.contains(&first) {
        return Err(invalid(
            subject,
            format!("leading segment '{first}' is a category, not a tenant id"),
        ));
    }

    Ok(first.to_string())
}

/// Deny access whenever the subject's leading tenant segment differs
/// from the context's tenant id.
///
/// # Errors
///
/// - `RoutingError::InvalidSubject` when the subject has no tenant prefix.
/// - `RoutingError::CrossTenantAccessDenied` on a tenant mismatch. The
///   denial is logged with structured detail (never payload contents).
pub fn validate_subject_tenant_access(
    ctx: &TenantContext,
    subject: &str,
) -> Result<(), RoutingError> {
    let subject_tenant = extract_tenant_from_subject(subject)?;

    if subject_tenant != ctx.tenant_id {
        warn!(
            subject = %subject,
            subject_tenant = %subject_tenant,
            caller_tenant = %ctx.tenant_id,
            "Cross-tenant subject access denied"
        );
        return Err(RoutingError::CrossTenantAccessDenied {
            subject_tenant,
            caller_tenant: ctx.tenant_id.clone(),
        });
    }

    Ok(())
}

/// Keep only the subjects owned by the caller's tenant, preserving
/// relative order. Malformed or foreign subjects are silently dropped;
/// used by discovery/listing endpoints so a tenant only ever observes
/// its own traffic.
#[must_use]
pub fn filter_subjects_by_tenant(ctx: &TenantContext, subjects: &[String]) -> Vec<String> {
    subjects
        .iter()
        .filter(|subject| validate_subject_tenant_access(ctx, subject).is_ok())
        .cloned()
        .collect()
}

fn invalid(subject: &str, reason: String) -> RoutingError {
    RoutingError::InvalidSubject {
        subject: subject.to_string(),
        reason,
    }
}
