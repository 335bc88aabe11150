use std::sync::Arc;

use anyhow::Context;
use auth_service::config::load_auth_config;
use auth_service::metrics::AuthMetrics;
use auth_service::store::{MemoryUserStore, PgUserStore, UserStore};
use auth_service::user_handlers::seed_admin;
use auth_service::{router, AppState};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use common_auth::TokenCodec;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_auth_config()?;

    let users: Arc<dyn UserStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("Failed to connect to DATABASE_URL")?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            Arc::new(PgUserStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory user store");
            Arc::new(MemoryUserStore::new())
        }
    };

    if let Some(admin) = &config.bootstrap_admin {
        seed_admin(users.as_ref(), admin)
            .await
            .map_err(|err| anyhow::anyhow!("Failed to seed bootstrap admin: {}", err.code()))?;
    }

    let codec = Arc::new(TokenCodec::new(config.jwt.clone()));
    let state = AppState::new(users, codec, AuthMetrics::new()?);

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            config
                .cors_allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION]);

    let app = router(state).layer(cors);

    let addr = config.addr();
    info!(%addr, "starting auth-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
