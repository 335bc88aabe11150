use std::sync::Arc;

use auth_service::metrics::AuthMetrics;
use auth_service::store::{MemoryUserStore, UserStore};
use auth_service::user_handlers::seed_admin;
use auth_service::{config::BootstrapAdmin, router, AppState};
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use common_auth::{JwtConfig, Principal, Role, TokenCodec};
use http_body_util::BodyExt;
use serde_json::Value;

pub const SECRET: &str = "integration-secret";
pub const ADMIN_EMAIL: &str = "admin@school.test";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
        seed_admin(
            users.as_ref(),
            &BootstrapAdmin {
                email: ADMIN_EMAIL.into(),
                password: ADMIN_PASSWORD.into(),
            },
        )
        .await
        .expect("seed admin");
        let codec = Arc::new(TokenCodec::new(JwtConfig::new(SECRET)));
        let state = AppState::new(users, codec, AuthMetrics::new().expect("metrics"));
        Self {
            router: router(state.clone()),
            state,
        }
    }

    pub fn token_for(&self, id: &str, role: Role) -> String {
        self.state
            .codec
            .issue_default(&Principal::new(id, role))
            .expect("issue token")
            .token
    }
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = resp.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
