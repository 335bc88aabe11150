use anyhow::{anyhow, Context, Result};
use common_auth::JwtConfig;
use std::env;
use std::net::{IpAddr, SocketAddr};

pub const DEFAULT_PORT: u16 = 4002;

#[derive(Debug, Clone)]
pub struct ClassConfig {
    pub host: IpAddr,
    pub port: u16,
    pub jwt: JwtConfig,
    pub database_url: Option<String>,
    pub cors_allowed_origins: Vec<String>,
}

impl ClassConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

pub fn load_class_config() -> Result<ClassConfig> {
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
        .filter(|value| !value.trim().is_empty());
    let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();

    Ok(ClassConfig {
        host,
        port,
        jwt,
        database_url,
        cors_allowed_origins,
    })
}
