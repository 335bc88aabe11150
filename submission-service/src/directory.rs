use std::sync::Arc;

use async_trait::async_trait;
use common_facts::{ClassDirectory, ClassRoster, FactKind, FactResult, SubjectFact};
use common_observability::ServiceMetrics;
use tracing::debug;

/// Counts every remote lookup by fact kind and outcome.
pub struct InstrumentedDirectory {
    inner: Arc<dyn ClassDirectory>,
    metrics: Arc<ServiceMetrics>,
}

impl InstrumentedDirectory {
    pub fn new(inner: Arc<dyn ClassDirectory>, metrics: Arc<ServiceMetrics>) -> Self {
        Self { inner, metrics }
    }

    fn observe<T>(&self, kind: FactKind, id: &str, result: FactResult<T>) -> FactResult<T> {
        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        };
        debug!(fact = kind.as_str(), id, outcome, "remote fact lookup");
        self.metrics.record_remote(kind.as_str(), outcome);
        result
    }
}

#[async_trait]
impl ClassDirectory for InstrumentedDirectory {
    async fn subject_exists(&self, subject_id: &str, bearer: &str) -> FactResult<bool> {
        let result = self.inner.subject_exists(subject_id, bearer).await;
        self.observe(FactKind::SubjectExists, subject_id, result)
    }

    async fn subject(&self, subject_id: &str, bearer: &str) -> FactResult<SubjectFact> {
        let result = self.inner.subject(subject_id, bearer).await;
        self.observe(FactKind::SubjectTeachers, subject_id, result)
    }

    async fn class_roster(&self, class_id: &str, bearer: &str) -> FactResult<ClassRoster> {
        let result = self.inner.class_roster(class_id, bearer).await;
        self.observe(FactKind::ClassRoster, class_id, result)
    }

    async fn enrolled_subject_ids(&self, student_id: &str, bearer: &str) -> FactResult<Vec<String>> {
        let result = self.inner.enrolled_subject_ids(student_id, bearer).await;
        self.observe(FactKind::StudentEnrollment, student_id, result)
    }
}
