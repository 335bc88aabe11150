use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    middleware,
    response::Response,
    routing::{get, post},
    Router,
};
use common_auth::TokenCodec;
use common_observability::{error_metrics_mw, metrics_endpoint, ServiceMetrics};

use crate::metrics::AuthMetrics;
use crate::store::UserStore;
use crate::user_handlers::{current_user, login_user, refresh_token, register_user};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub codec: Arc<TokenCodec>,
    pub metrics: AuthMetrics,
}

impl AppState {
    pub fn new(users: Arc<dyn UserStore>, codec: Arc<TokenCodec>, metrics: AuthMetrics) -> Self {
        Self {
            users,
            codec,
            metrics,
        }
    }
}

impl FromRef<AppState> for Arc<TokenCodec> {
    fn from_ref(state: &AppState) -> Self {
        state.codec.clone()
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
        .route("/auth/login", post(login_user))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/register", post(register_user))
        .route("/auth/me", get(current_user))
        .with_state(state)
        .layer(middleware::from_fn_with_state(service_metrics, error_metrics_mw))
}
