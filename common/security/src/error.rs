use common_http_errors::ApiError;

use crate::coordinator::{AccessDenied, DenyReason};
use crate::policy::{join_roles, PolicyDenial};

impl From<PolicyDenial> for ApiError {
    fn from(value: PolicyDenial) -> Self {
        match value {
            PolicyDenial::InsufficientRole { allowed, .. } => ApiError::ForbiddenMissingRole {
                role: join_roles(&allowed),
            },
            PolicyDenial::NotOwner => ApiError::forbidden("not_owner", "not the owner of the resource"),
        }
    }
}

impl From<AccessDenied> for ApiError {
    fn from(value: AccessDenied) -> Self {
        match value {
            AccessDenied::Denied {
                reason: DenyReason::MissingRole(allowed),
                ..
            } => ApiError::ForbiddenMissingRole {
                role: join_roles(&allowed),
            },
            AccessDenied::Denied { reason, .. } => ApiError::forbidden(reason.code(), reason.to_string()),
            AccessDenied::Remote(err) => err.into(),
        }
    }
}
