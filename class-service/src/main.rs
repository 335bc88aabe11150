use std::sync::Arc;

use anyhow::Context;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use class_service::app::SERVICE_NAME;
use class_service::config::load_class_config;
use class_service::memory_store::MemoryClassStore;
use class_service::pg_store::PgClassStore;
use class_service::store::ClassStore;
use class_service::{router, AppState};
use common_auth::TokenCodec;
use common_observability::ServiceMetrics;
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

    let config = load_class_config()?;

    let store: Arc<dyn ClassStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("Failed to connect to DATABASE_URL")?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            Arc::new(PgClassStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory class store");
            Arc::new(MemoryClassStore::new())
        }
    };

    let state = AppState {
        store,
        codec: Arc::new(TokenCodec::new(config.jwt.clone())),
        metrics: Arc::new(ServiceMetrics::new(SERVICE_NAME)?),
    };

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            config
                .cors_allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION]);

    let app = router(state).layer(cors);

    let addr = config.addr();
    info!(%addr, "starting class-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
