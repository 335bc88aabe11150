use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Per-service Prometheus registry and the counters every service shares.
#[derive(Clone)]
pub struct ServiceMetrics {
    pub service: &'static str,
    pub registry: Registry,
    pub http_errors_total: IntCounterVec,
    pub remote_fact_requests_total: IntCounterVec,
    pub access_denials_total: IntCounterVec,
    pub orphan_sweep_deleted_total: IntCounter,
    pub orphan_sweep_failures_total: IntCounter,
    pub orphan_sweep_duration_seconds: Histogram,
}

impl ServiceMetrics {
    pub fn new(service: &'static str) -> prometheus::Result<Self> {
        let registry = Registry::new();
        let http_errors_total = IntCounterVec::new(
            Opts::new("http_errors_total", "Count of HTTP error responses emitted (status >= 400)"),
            &["service", "code", "status"],
        )?;
        let remote_fact_requests_total = IntCounterVec::new(
            Opts::new("remote_fact_requests_total", "Remote fact lookups by fact kind and outcome"),
            &["fact", "outcome"],
        )?;
        let access_denials_total = IntCounterVec::new(
            Opts::new("access_denials_total", "Requests refused by the authorization coordinator"),
            &["reason"],
        )?;
        let orphan_sweep_deleted_total = IntCounter::new(
            "orphan_sweep_deleted_total",
            "Orphaned assignments removed by the sweeper",
        )?;
        let orphan_sweep_failures_total = IntCounter::new(
            "orphan_sweep_failures_total",
            "Sweeper passes that ended in an error",
        )?;
        let orphan_sweep_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("orphan_sweep_duration_seconds", "Duration of an orphan sweep pass")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        )?;
        registry.register(Box::new(http_errors_total.clone()))?;
        registry.register(Box::new(remote_fact_requests_total.clone()))?;
        registry.register(Box::new(access_denials_total.clone()))?;
        registry.register(Box::new(orphan_sweep_deleted_total.clone()))?;
        registry.register(Box::new(orphan_sweep_failures_total.clone()))?;
        registry.register(Box::new(orphan_sweep_duration_seconds.clone()))?;
        Ok(ServiceMetrics {
            service,
            registry,
            http_errors_total,
            remote_fact_requests_total,
            access_denials_total,
            orphan_sweep_deleted_total,
            orphan_sweep_failures_total,
            orphan_sweep_duration_seconds,
        })
    }

    pub fn record_remote(&self, fact: &str, outcome: &str) {
        self.remote_fact_requests_total.with_label_values(&[fact, outcome]).inc();
    }

    pub fn record_denial(&self, reason: &str) {
        self.access_denials_total.with_label_values(&[reason]).inc();
    }

    /// Text exposition of every registered family.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

pub async fn metrics_endpoint(State(metrics): State<Arc<ServiceMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => ([(CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {e}")).into_response(),
    }
}

/// Counts error responses by the `X-Error-Code` header they carry.
pub async fn error_metrics_mw(
    State(metrics): State<Arc<ServiceMetrics>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp
            .headers()
            .get("x-error-code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        metrics
            .http_errors_total
            .with_label_values(&[metrics.service, code, status.as_str()])
            .inc();
    }
    resp
}
