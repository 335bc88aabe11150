use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    middleware,
    response::Response,
    routing::{get, put},
    Router,
};
use common_auth::TokenCodec;
use common_observability::{error_metrics_mw, metrics_endpoint, ServiceMetrics};

use crate::class_handlers::{
    add_student_to_class, add_subject_to_class, create_class, delete_class, get_class, list_class_subjects,
    list_classes, update_class,
};
use crate::store::ClassStore;
use crate::student_handlers::{my_classes, student_subjects};
use crate::subject_handlers::{create_subject, delete_subject, get_subject, list_subjects, update_subject};

pub const SERVICE_NAME: &str = "class-service";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ClassStore>,
    pub codec: Arc<TokenCodec>,
    pub metrics: Arc<ServiceMetrics>,
}

impl FromRef<AppState> for Arc<TokenCodec> {
    fn from_ref(state: &AppState) -> Self {
        state.codec.clone()
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AppState>) -> Response {
    metrics_endpoint(State(state.metrics)).await
}

pub fn router(state: AppState) -> Router {
    let metrics_state = state.metrics.clone();
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/subjects", get(list_subjects).post(create_subject))
        .route(
            "/subjects/:id",
            get(get_subject).put(update_subject).delete(delete_subject),
        )
        .route("/classes", get(list_classes).post(create_class))
        .route(
            "/classes/:id",
            get(get_class).patch(update_class).delete(delete_class),
        )
        .route(
            "/classes/:id/subjects",
            get(list_class_subjects).put(add_subject_to_class),
        )
        .route("/classes/:id/students", put(add_student_to_class))
        .route("/students/me/classes", get(my_classes))
        .route("/students/:id/subjects", get(student_subjects))
        .with_state(state)
        .layer(middleware::from_fn_with_state(metrics_state, error_metrics_mw))
}
