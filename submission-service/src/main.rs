use std::sync::Arc;

use anyhow::Context;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use common_auth::TokenCodec;
use common_facts::ClassServiceClient;
use common_observability::ServiceMetrics;
use sqlx::postgres::PgPoolOptions;
use submission_service::app::SERVICE_NAME;
use submission_service::config::load_submission_config;
use submission_service::memory_store::MemorySubmissionStore;
use submission_service::pg_store::PgSubmissionStore;
use submission_service::store::SubmissionStore;
use submission_service::{router, AppState, OrphanSweeper};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_submission_config()?;

    let store: Arc<dyn SubmissionStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .context("Failed to connect to DATABASE_URL")?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            Arc::new(PgSubmissionStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory submission store");
            Arc::new(MemorySubmissionStore::new())
        }
    };

    let metrics = Arc::new(ServiceMetrics::new(SERVICE_NAME)?);
    let class_directory = ClassServiceClient::new(&config.class_service_url, config.remote_timeout)
        .context("Failed to build class-service client")?;
    info!(
        class_service_url = %config.class_service_url,
        timeout_ms = config.remote_timeout.as_millis() as u64,
        "class-service client configured"
    );

    let sweeper = OrphanSweeper::new(
        store.clone(),
        metrics.clone(),
        config.sweep_interval,
        config.orphan_retention,
    )
    .spawn();
    info!(
        interval_secs = config.sweep_interval.as_secs(),
        retention_secs = config.orphan_retention.num_seconds(),
        "orphan sweeper started"
    );

    let state = AppState::new(
        store,
        Arc::new(TokenCodec::new(config.jwt.clone())),
        Arc::new(class_directory),
        metrics,
    );

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
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION]);

    let app = router(state).layer(cors);

    let addr = config.addr();
    info!(%addr, "starting submission-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    sweeper.shutdown().await;
    Ok(())
}
