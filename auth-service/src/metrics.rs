use std::sync::Arc;

use anyhow::Result;
use common_observability::ServiceMetrics;
use prometheus::{IntCounterVec, Opts};

pub const SERVICE_NAME: &str = "auth-service";

#[derive(Clone)]
pub struct AuthMetrics {
    pub service: Arc<ServiceMetrics>,
    login_attempts: IntCounterVec,
}

impl AuthMetrics {
    pub fn new() -> Result<Self> {
        let service = ServiceMetrics::new(SERVICE_NAME)?;

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "auth_login_attempts_total",
                "Count of login attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        service.registry.register(Box::new(login_attempts.clone()))?;

        Ok(Self {
            service: Arc::new(service),
            login_attempts,
        })
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn login_attempts(&self, outcome: &str) -> u64 {
        self.login_attempts.with_label_values(&[outcome]).get()
    }
}
