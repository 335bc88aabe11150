use anyhow::{anyhow, Context, Result};
use common_auth::JwtConfig;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4003;
pub const DEFAULT_CLASS_SERVICE_URL: &str = "http://class-service:4002";
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60 * 60;
pub const DEFAULT_ORPHAN_RETENTION_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct SubmissionConfig {
    pub host: IpAddr,
    pub port: u16,
    pub jwt: JwtConfig,
    pub database_url: Option<String>,
    pub cors_allowed_origins: Vec<String>,
    pub class_service_url: String,
    pub remote_timeout: Duration,
    pub sweep_interval: Duration,
    pub orphan_retention: chrono::Duration,
}

impl SubmissionConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

pub fn load_submission_config() -> Result<SubmissionConfig> {
    let jwt = JwtConfig::from_env().context("Failed to load JWT configuration")?;
    submission_config_from(|key| env::var(key).ok(), jwt)
}

/// Builds the config from an arbitrary variable source.
pub fn submission_config_from<F>(lookup: F, jwt: JwtConfig) -> Result<SubmissionConfig>
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
    let database_url = lookup("DATABASE_URL").filter(|value| !value.trim().is_empty());
    let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|| "http://localhost:3000,http://localhost:5173".to_string())
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();
    let class_service_url = lookup("CLASS_SERVICE_URL")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_CLASS_SERVICE_URL.to_string());

    let remote_timeout_ms = positive(&lookup, "REMOTE_TIMEOUT_MS", DEFAULT_REMOTE_TIMEOUT_MS)?;
    let sweep_interval_secs = positive(&lookup, "SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?;
    let retention_secs = positive(&lookup, "ORPHAN_RETENTION_SECS", DEFAULT_ORPHAN_RETENTION_SECS)?;
    let orphan_retention = chrono::Duration::from_std(Duration::from_secs(retention_secs))
        .map_err(|err| anyhow!("Invalid ORPHAN_RETENTION_SECS '{retention_secs}': {err}"))?;

    Ok(SubmissionConfig {
        host,
        port,
        jwt,
        database_url,
        cors_allowed_origins,
        class_service_url,
        remote_timeout: Duration::from_millis(remote_timeout_ms),
        sweep_interval: Duration::from_secs(sweep_interval_secs),
        orphan_retention,
    })
}

fn positive<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => match value.trim().parse::<u64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            Ok(_) => Err(anyhow!("{key} must be greater than zero")),
            Err(err) => Err(anyhow!("Invalid {key} '{value}': {err}")),
        },
        None => Ok(default),
    }
}
