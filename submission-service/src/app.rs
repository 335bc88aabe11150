use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    middleware,
    response::Response,
    routing::{get, patch, post},
    Router,
};
use common_auth::{AuthContext, Role, TokenCodec};
use common_facts::ClassDirectory;
use common_observability::{error_metrics_mw, metrics_endpoint, ServiceMetrics};
use common_security::{AccessDenied, Action, AuthorizationCoordinator, Grant, Target};

use crate::assignment_handlers::{
    create_assignment, delete_assignment, get_assignment, my_assignments, student_assignments, subject_assignments,
    update_assignment,
};
use crate::directory::InstrumentedDirectory;
use crate::store::SubmissionStore;
use crate::submission_handlers::{
    assignment_submissions, create_submission, get_submission, grade_submission, list_submissions, my_submissions,
};

pub const SERVICE_NAME: &str = "submission-service";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SubmissionStore>,
    pub codec: Arc<TokenCodec>,
    /// Class service facts, with every lookup counted.
    pub directory: Arc<dyn ClassDirectory>,
    pub coordinator: AuthorizationCoordinator,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        codec: Arc<TokenCodec>,
        directory: Arc<dyn ClassDirectory>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        let directory: Arc<dyn ClassDirectory> = Arc::new(InstrumentedDirectory::new(directory, metrics.clone()));
        Self {
            store,
            codec,
            coordinator: AuthorizationCoordinator::new(directory.clone()),
            directory,
            metrics,
        }
    }

    /// Runs the coordinator and counts refusals by reason.
    pub async fn authorize(
        &self,
        auth: &AuthContext,
        allowed: &[Role],
        target: Target<'_>,
        action: Action,
    ) -> Result<Grant, AccessDenied> {
        let verdict = self.coordinator.authorize(auth, allowed, target, action).await;
        if let Err(err) = &verdict {
            self.metrics.record_denial(err.reason_code());
        }
        verdict
    }
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
        .route("/assignments", post(create_assignment))
        .route("/assignments/mine", get(my_assignments))
        .route(
            "/assignments/:id",
            get(get_assignment).patch(update_assignment).delete(delete_assignment),
        )
        .route("/subjects/:subject_id/assignments", get(subject_assignments))
        .route("/students/assignments", get(student_assignments))
        .route("/submissions", get(list_submissions).post(create_submission))
        .route("/submissions/me", get(my_submissions))
        .route("/submissions/for-assignment/:id", get(assignment_submissions))
        .route("/submissions/:id", get(get_submission))
        .route("/submissions/:id/grade", patch(grade_submission))
        .with_state(state)
        .layer(middleware::from_fn_with_state(metrics_state, error_metrics_mw))
}
