use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

use crate::claims::{Claims, ClaimsRepr, Principal, TokenKind};
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// A freshly signed bearer credential.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
}

/// Signs and verifies HS256 bearer tokens with the shared secret.
///
/// Every service holds its own codec built from the same [`JwtConfig`], which
/// lets any of them authenticate a request without a session store. There is
/// no revocation list: a token stays valid until `exp`.
///
/// Refresh tokens carry `typ: "refresh"`. [`TokenCodec::verify`] refuses them,
/// so they only ever reach the refresh endpoint.
#[derive(Clone)]
pub struct TokenCodec {
    config: JwtConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenCodec {
    pub fn new(config: JwtConfig) -> Self {
        let encoding = EncodingKey::from_secret(&config.secret);
        let decoding = DecodingKey::from_secret(&config.secret);
        Self {
            config,
            encoding,
            decoding,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Issue a token with the configured TTL.
    pub fn issue_default(&self, principal: &Principal) -> AuthResult<IssuedToken> {
        self.issue(principal, Duration::seconds(self.config.ttl_seconds))
    }

    pub fn issue(&self, principal: &Principal, ttl: Duration) -> AuthResult<IssuedToken> {
        self.sign(principal, ttl, TokenKind::Access)
    }

    /// Issue a long-lived refresh token with the configured refresh TTL.
    pub fn issue_refresh(&self, principal: &Principal) -> AuthResult<IssuedToken> {
        self.sign(
            principal,
            Duration::seconds(self.config.refresh_ttl_seconds),
            TokenKind::Refresh,
        )
    }

    fn sign(&self, principal: &Principal, ttl: Duration, kind: TokenKind) -> AuthResult<IssuedToken> {
        let issued_at = Utc::now();
        let expires_at = issued_at + ttl;
        let repr = ClaimsRepr {
            id: principal.id.clone(),
            role: principal.role.as_str().to_string(),
            exp: expires_at.timestamp(),
            iat: Some(issued_at.timestamp()),
            typ: kind.typ(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &repr, &self.encoding)
            .map_err(|err| AuthError::Signing(err.to_string()))?;
        Ok(IssuedToken {
            token,
            expires_at,
            expires_in: ttl.num_seconds(),
        })
    }

    /// Verify an access token. Refresh tokens are rejected.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let claims = self.decode_as(token, TokenKind::Access)?;
        debug!(principal_id = %claims.principal.id, role = %claims.principal.role, "verified JWT successfully");
        Ok(claims)
    }

    /// Verify a refresh token. Access tokens are rejected.
    pub fn verify_refresh(&self, token: &str) -> AuthResult<Claims> {
        let claims = self.decode_as(token, TokenKind::Refresh)?;
        debug!(principal_id = %claims.principal.id, "verified refresh token");
        Ok(claims)
    }

    fn decode_as(&self, token: &str, expected: TokenKind) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.config.leeway_seconds.into();
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        let token_data = decode::<ClaimsRepr>(token, &self.decoding, &validation)?;
        let kind = TokenKind::of(&token_data.claims)?;
        if kind != expected {
            return Err(AuthError::InvalidClaim(
                "typ",
                token_data.claims.typ.unwrap_or_else(|| "access".into()),
            ));
        }
        Claims::try_from(token_data.claims)
    }
}
