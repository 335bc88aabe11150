use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{FromRef, State},
    middleware,
    response::Response,
    routing::get,
    Router,
};
use common_observability::{error_metrics_mw, metrics_endpoint, ServiceMetrics};
use reqwest::{redirect, Client};

use crate::config::GatewayConfig;
use crate::metrics::GatewayMetrics;
use crate::proxy::proxy;
use crate::upstream::Upstreams;

#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    pub upstreams: Arc<Upstreams>,
    pub metrics: GatewayMetrics,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &GatewayConfig, metrics: GatewayMetrics) -> Result<Self> {
        // Redirects are relayed to the caller rather than followed.
        let client = Client::builder()
            .timeout(config.remote_timeout)
            .redirect(redirect::Policy::none())
            .build()
            .context("Failed to build upstream HTTP client")?;
        Ok(Self {
            client,
            upstreams: Arc::new(Upstreams::from_config(config)?),
            metrics,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

impl FromRef<AppState> for Arc<ServiceMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.service.clone()
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AppState>) -> Response {
    metrics_endpoint(State(state.metrics.service.clone())).await
}

pub fn router(state: AppState) -> Router {
    let service_metrics = state.metrics.service.clone();
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .fallback(proxy)
        .with_state(state)
        .layer(middleware::from_fn_with_state(service_metrics, error_metrics_mw))
}
