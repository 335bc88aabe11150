use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use class_service::app::SERVICE_NAME;
use class_service::memory_store::MemoryClassStore;
use class_service::{router, AppState};
use common_auth::{JwtConfig, Principal, Role, TokenCodec};
use common_observability::ServiceMetrics;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub codec: Arc<TokenCodec>,
}

impl TestApp {
    pub fn new() -> Self {
        let codec = Arc::new(TokenCodec::new(JwtConfig::new("class-test-secret")));
        let state = AppState {
            store: Arc::new(MemoryClassStore::new()),
            codec: codec.clone(),
            metrics: Arc::new(ServiceMetrics::new(SERVICE_NAME).expect("metrics")),
        };
        Self {
            router: router(state),
            codec,
        }
    }

    pub fn token(&self, id: &str, role: Role) -> String {
        self.codec
            .issue_default(&Principal::new(id, role))
            .expect("issue")
            .token
    }

    pub async fn call(&self, method: &str, uri: &str, token: &str, body: Option<Value>) -> (u16, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"));
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let resp = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");
        let status = resp.status().as_u16();
        (status, body_json(resp).await)
    }
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = resp.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
