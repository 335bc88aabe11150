use anyhow::{anyhow, Context, Result};
use common_auth::JwtConfig;
use std::env;
use std::net::{IpAddr, SocketAddr};

pub const DEFAULT_PORT: u16 = 4001;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

/// Credentials for the first admin account, created at start-up when no
/// user with that email exists yet.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub host: IpAddr,
    pub port: u16,
    pub jwt: JwtConfig,
    pub database_url: Option<String>,
    pub cors_allowed_origins: Vec<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AuthConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

pub fn load_auth_config() -> Result<AuthConfig> {
    let host = env::var("HOST")
        .unwrap_or_else(|_| "0.0.0.0".to_string())
        .parse::<IpAddr>()
        .context("Failed to parse HOST")?;
    let port = match env::var("PORT") {
        Ok(value) => value
            .trim()
            .parse::<u16>()
            .map_err(|err| anyhow!("Invalid PORT '{value}': {err}"))?,
        Err(_) => DEFAULT_PORT,
    };

    let jwt = JwtConfig::from_env().context("Failed to load JWT configuration")?;
    let database_url = env::var("DATABASE_URL")
        .ok()
        .and_then(|value| normalize_optional(&value));
    let cors_allowed_origins = parse_origins(
        &env::var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|_| DEFAULT_CORS_ORIGINS.to_string()),
    );

    let bootstrap_admin = match (
        env::var("BOOTSTRAP_ADMIN_EMAIL").ok().and_then(|v| normalize_optional(&v)),
        env::var("BOOTSTRAP_ADMIN_PASSWORD").ok().and_then(|v| normalize_optional(&v)),
    ) {
        (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
        (None, None) => None,
        _ => {
            return Err(anyhow!(
                "BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"
            ))
        }
    };

    Ok(AuthConfig {
        host,
        port,
        jwt,
        database_url,
        cors_allowed_origins,
        bootstrap_admin,
    })
}

pub fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(normalize_optional)
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
