//! Caller context resolved by the authorization layer.

use std::fmt::{Display, Formatter};

/// Tenant and actor of an already-authenticated, already-authorized caller.
///
/// Core code trusts these identifiers; it only rejects blank values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantScope {
    pub tenant_id: String,
    pub actor_id: String,
}

impl TenantScope {
    pub fn new(tenant_id: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            actor_id: actor_id.into(),
        }
    }
}

impl Display for TenantScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "tenant={} actor={}", self.tenant_id, self.actor_id)
    }
}
