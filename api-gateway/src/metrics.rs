use std::sync::Arc;

use anyhow::Result;
use common_observability::ServiceMetrics;
use prometheus::{IntCounterVec, Opts};

pub const SERVICE_NAME: &str = "api-gateway";

#[derive(Clone)]
pub struct GatewayMetrics {
    pub service: Arc<ServiceMetrics>,
    upstream_requests: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self> {
        let service = ServiceMetrics::new(SERVICE_NAME)?;
        let upstream_requests = IntCounterVec::new(
            Opts::new(
                "gateway_upstream_requests_total",
                "Proxied requests grouped by backend and outcome",
            ),
            &["upstream", "outcome"],
        )?;
        service.registry.register(Box::new(upstream_requests.clone()))?;
        Ok(Self {
            service: Arc::new(service),
            upstream_requests,
        })
    }

    pub fn record_upstream(&self, upstream: &str, outcome: &str) {
        self.upstream_requests.with_label_values(&[upstream, outcome]).inc();
    }

    pub fn upstream_requests(&self, upstream: &str, outcome: &str) -> u64 {
        self.upstream_requests.with_label_values(&[upstream, outcome]).get()
    }
}
