use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};
use common_http_errors::ApiError;
use thiserror::Error;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::upstream::{resolve, Upstream};

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no backend serves {0}")]
    UnknownRoute(String),
    #[error("request body rejected: {0}")]
    InvalidBody(String),
    #[error("{upstream} did not answer: {source}")]
    Upstream {
        upstream: Upstream,
        #[source]
        source: reqwest::Error,
    },
}

impl From<ProxyError> for ApiError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::UnknownRoute(_) => ApiError::not_found("unknown_route"),
            ProxyError::InvalidBody(message) => ApiError::bad_request("invalid_body", message),
            ProxyError::Upstream { upstream, .. } => ApiError::BadGateway {
                code: "upstream_unavailable",
                message: Some(format!("{upstream} is unavailable")),
            },
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

const HOP_BY_HOP: [&str; 10] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Forwards `/api/<service>/...` to the owning backend and relays its answer
/// unchanged. Credentials pass through; each backend authenticates itself.
pub async fn proxy(State(state): State<AppState>, req: Request) -> Result<Response, ProxyError> {
    let (parts, body) = req.into_parts();
    let path = parts.uri.path();
    let (upstream, backend_path) =
        resolve(path).ok_or_else(|| ProxyError::UnknownRoute(path.to_string()))?;
    let target = state
        .upstreams
        .target(upstream, &backend_path, parts.uri.query());

    let bytes = to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|err| ProxyError::InvalidBody(err.to_string()))?;

    debug!(%upstream, method = %parts.method, %target, "proxying request");
    let sent = state
        .client
        .request(parts.method.clone(), &target)
        .headers(end_to_end(&parts.headers))
        .body(bytes)
        .send()
        .await;
    let upstream_resp = match sent {
        Ok(resp) => resp,
        Err(source) => {
            warn!(%upstream, error = %source, "upstream request failed");
            state.metrics.record_upstream(upstream.as_str(), "unavailable");
            return Err(ProxyError::Upstream { upstream, source });
        }
    };

    let status = StatusCode::from_u16(upstream_resp.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let headers = end_to_end(upstream_resp.headers());
    let payload = match upstream_resp.bytes().await {
        Ok(payload) => payload,
        Err(source) => {
            warn!(%upstream, error = %source, "upstream body could not be read");
            state.metrics.record_upstream(upstream.as_str(), "unavailable");
            return Err(ProxyError::Upstream { upstream, source });
        }
    };
    state.metrics.record_upstream(
        upstream.as_str(),
        if status.is_server_error() { "error" } else { "ok" },
    );

    let mut resp = Response::new(Body::from(payload));
    *resp.status_mut() = status;
    *resp.headers_mut() = headers;
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};

    #[test]
    fn hop_by_hop_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::HOST, HeaderValue::from_static("gateway:3000"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-error-code", HeaderValue::from_static("not_owner"));

        let kept = end_to_end(&headers);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[header::AUTHORIZATION], "Bearer abc");
        assert_eq!(kept["x-error-code"], "not_owner");
    }

    #[test]
    fn errors_map_to_gateway_codes() {
        let err: ApiError = ProxyError::UnknownRoute("/nope".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "unknown_route");
        let err: ApiError = ProxyError::InvalidBody("too large".into()).into();
        assert_eq!(err.code(), "invalid_body");
    }
}
