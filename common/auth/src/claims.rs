use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

/// Authenticated identity carried by a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Application-focused representation of verified JWT claims.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub principal: Principal,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
}

impl Claims {
    pub fn has_role(&self, role: Role) -> bool {
        self.principal.role == role
    }
}

/// Wire shape of the token payload, shared by the signer and the verifier.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClaimsRepr {
    pub id: String,
    pub role: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// `"refresh"` on refresh tokens; absent on access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

pub(crate) const REFRESH_TYP: &str = "refresh";

/// Which of the two token flavours a payload claims to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub(crate) fn typ(self) -> Option<String> {
        match self {
            TokenKind::Access => None,
            TokenKind::Refresh => Some(REFRESH_TYP.to_string()),
        }
    }

    pub(crate) fn of(repr: &ClaimsRepr) -> AuthResult<Self> {
        match repr.typ.as_deref() {
            None | Some("access") => Ok(TokenKind::Access),
            Some(REFRESH_TYP) => Ok(TokenKind::Refresh),
            Some(other) => Err(AuthError::InvalidClaim("typ", other.to_string())),
        }
    }
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        if value.id.trim().is_empty() {
            return Err(AuthError::InvalidClaim("id", value.id));
        }
        let role = value
            .role
            .parse::<Role>()
            .map_err(|_| AuthError::InvalidClaim("role", value.role.clone()))?;

        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            principal: Principal {
                id: value.id,
                role,
            },
            expires_at,
            issued_at,
        })
    }
}
