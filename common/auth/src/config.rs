use std::env;
use std::fmt;

use thiserror::Error;

pub const DEV_SECRET: &str = "devsecret";
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 3600;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwtConfigError {
    #[error("JWT_SECRET must be set outside APP_ENV=dev")]
    MissingSecret,
    #[error("invalid value for {0}: '{1}'")]
    Invalid(&'static str, String),
}

/// Runtime configuration shared by token issuing and verification.
///
/// Built once at process start and handed to [`crate::TokenCodec`]; every
/// service must be configured with the same secret.
#[derive(Clone)]
pub struct JwtConfig {
    /// Shared HMAC secret.
    pub secret: Vec<u8>,
    /// Lifetime of issued access tokens in seconds.
    pub ttl_seconds: i64,
    /// Lifetime of refresh tokens in seconds.
    pub refresh_ttl_seconds: i64,
    /// Allowable clock skew in seconds when validating exp.
    pub leeway_seconds: u32,
}

impl JwtConfig {
    /// One hour access TTL, seven day refresh TTL, no leeway.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl_seconds: 3600,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            leeway_seconds: 0,
        }
    }

    pub fn with_ttl(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    pub fn with_refresh_ttl(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    /// Read `JWT_SECRET`, `JWT_TTL_SECONDS`, `JWT_REFRESH_TTL_SECONDS` and
    /// `JWT_LEEWAY_SECONDS`.
    pub fn from_env() -> Result<Self, JwtConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// The dev secret is only used when `APP_ENV=dev` and no secret is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, JwtConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = match lookup("JWT_SECRET").filter(|s| !s.trim().is_empty()) {
            Some(secret) => secret,
            None if lookup("APP_ENV").as_deref() == Some("dev") => {
                tracing::warn!("JWT_SECRET unset; using development secret");
                DEV_SECRET.to_string()
            }
            None => return Err(JwtConfigError::MissingSecret),
        };

        let mut config = Self::new(secret);
        if let Some(raw) = lookup("JWT_TTL_SECONDS") {
            let ttl = raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|ttl| *ttl > 0)
                .ok_or(JwtConfigError::Invalid("JWT_TTL_SECONDS", raw))?;
            config = config.with_ttl(ttl);
        }
        if let Some(raw) = lookup("JWT_REFRESH_TTL_SECONDS") {
            let ttl = raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|ttl| *ttl > 0)
                .ok_or(JwtConfigError::Invalid("JWT_REFRESH_TTL_SECONDS", raw))?;
            config = config.with_refresh_ttl(ttl);
        }
        if let Some(raw) = lookup("JWT_LEEWAY_SECONDS") {
            let leeway = raw
                .trim()
                .parse::<u32>()
                .map_err(|_| JwtConfigError::Invalid("JWT_LEEWAY_SECONDS", raw))?;
            config = config.with_leeway(leeway);
        }
        Ok(config)
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("ttl_seconds", &self.ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}
