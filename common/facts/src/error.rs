use common_http_errors::ApiError;
use thiserror::Error;

pub type FactResult<T> = Result<T, FactError>;

/// Failure to obtain a fact from a peer service.
///
/// None of these variants may be read as permission: callers deny or fail
/// the request on every one of them.
#[derive(Debug, Clone, Error)]
pub enum FactError {
    #[error("{target} unavailable: {reason}")]
    Unavailable { target: &'static str, reason: String },
    #[error("{target} denied the lookup (HTTP {status})")]
    Denied { target: &'static str, status: u16 },
    #[error("{target} has no such resource")]
    NotFound { target: &'static str },
    #[error("{target} client misconfigured: {reason}")]
    Misconfigured { target: &'static str, reason: String },
}

impl FactError {
    pub fn kind(&self) -> &'static str {
        match self {
            FactError::Unavailable { .. } => "unavailable",
            FactError::Denied { .. } => "denied",
            FactError::NotFound { .. } => "not_found",
            FactError::Misconfigured { .. } => "misconfigured",
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, FactError::Unavailable { .. })
    }
}

impl From<FactError> for ApiError {
    fn from(value: FactError) -> Self {
        match value {
            FactError::Unavailable { target, reason } => {
                tracing::warn!(target_service = target, %reason, "remote fact unavailable");
                ApiError::BadGateway {
                    code: "remote_unavailable",
                    message: Some(format!("{target} could not be reached; retry later")),
                }
            }
            FactError::Denied { target, .. } => ApiError::Forbidden {
                code: "remote_denied",
                message: Some(format!("{target} refused access to the referenced resource")),
            },
            FactError::NotFound { .. } => ApiError::NotFound { code: "remote_not_found" },
            err @ FactError::Misconfigured { .. } => ApiError::internal(err),
        }
    }
}
