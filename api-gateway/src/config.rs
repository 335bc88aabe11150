use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: IpAddr,
    pub port: u16,
    pub auth_service_url: String,
    pub class_service_url: String,
    pub submission_service_url: String,
    pub remote_timeout: Duration,
    pub max_body_bytes: usize,
    pub cors_allowed_origins: Vec<String>,
}

impl GatewayConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST")
            .unwrap_or_else(|| "0.0.0.0".to_string())
            .parse::<IpAddr>()
            .context("Failed to parse HOST")?;
        let port = match lookup("PORT") {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|err| anyhow!("Invalid PORT '{value}': {err}"))?,
            None => DEFAULT_PORT,
        };
        let url = |key: &str, default: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let remote_timeout_ms = match lookup("REMOTE_TIMEOUT_MS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => ms,
                _ => return Err(anyhow!("Invalid REMOTE_TIMEOUT_MS '{value}'")),
            },
            None => DEFAULT_REMOTE_TIMEOUT_MS,
        };
        let max_body_bytes = lookup("GATEWAY_MAX_BODY_BYTES")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);
        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:5173".to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            host,
            port,
            auth_service_url: url("AUTH_SERVICE_URL", "http://auth-service:4001"),
            class_service_url: url("CLASS_SERVICE_URL", "http://class-service:4002"),
            submission_service_url: url("SUBMISSION_SERVICE_URL", "http://submission-service:4003"),
            remote_timeout: Duration::from_millis(remote_timeout_ms),
            max_body_bytes,
            cors_allowed_origins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_service_names() {
        let cfg = GatewayConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.auth_service_url, "http://auth-service:4001");
        assert_eq!(cfg.submission_service_url, "http://submission-service:4003");
        assert_eq!(cfg.remote_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = GatewayConfig::from_lookup(|key| (key == "REMOTE_TIMEOUT_MS").then(|| "0".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("REMOTE_TIMEOUT_MS"));
    }
}
