use common_auth::{Principal, Role};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyDenial {
    #[error("role {actual} is not allowed (requires {})", join_roles(.allowed))]
    InsufficientRole { actual: Role, allowed: Vec<Role> },
    #[error("principal does not own the resource")]
    NotOwner,
}

impl PolicyDenial {
    pub fn code(&self) -> &'static str {
        match self {
            PolicyDenial::InsufficientRole { .. } => "missing_role",
            PolicyDenial::NotOwner => "not_owner",
        }
    }
}

pub(crate) fn join_roles(roles: &[Role]) -> String {
    roles.iter().map(Role::as_str).collect::<Vec<_>>().join("|")
}

/// An empty `allowed` set admits every authenticated principal.
pub fn require_role(principal: &Principal, allowed: &[Role]) -> Result<(), PolicyDenial> {
    if allowed.is_empty() || allowed.contains(&principal.role) {
        return Ok(());
    }
    warn!(principal_id = %principal.id, role = %principal.role, required = %join_roles(allowed), "role_check_failed");
    Err(PolicyDenial::InsufficientRole {
        actual: principal.role,
        allowed: allowed.to_vec(),
    })
}

pub fn require_ownership(principal: &Principal, owner_id: &str) -> Result<(), PolicyDenial> {
    if principal.id == owner_id {
        return Ok(());
    }
    warn!(principal_id = %principal.id, owner_id, "ownership_check_failed");
    Err(PolicyDenial::NotOwner)
}
