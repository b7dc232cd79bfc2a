//! Request-scoped tenant context.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The tenant on whose behalf a request is executing.
///
/// Carried through request-scoped context; never persisted on the
/// message envelope except implicitly via the subject prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantContext {
    /// Opaque stable tenant identifier. Becomes the leading subject
    /// segment for all of this tenant's traffic.
    pub tenant_id: String,

    /// Human-readable tenant name.
    pub tenant_name: String,

    /// Open map of resource limits (max agents, token budgets, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resource_limits: BTreeMap<String, serde_json::Value>,
}

impl TenantContext {
    /// Context with no resource limits.
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, tenant_name: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            tenant_name: tenant_name.into(),
            resource_limits: BTreeMap::new(),
        }
    }

    /// Attach a resource limit.
    #[must_use]
    pub fn with_limit(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.resource_limits.insert(key.into(), value);
        self
    }
}
