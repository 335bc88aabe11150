use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::FactResult;
use crate::fetcher::FactFetcher;
use crate::model::{ClassRoster, SubjectFact};

pub const CLASS_SERVICE: &str = "class-service";

/// Read-only view of the facts the class service owns.
///
/// Every call carries the caller's bearer value (`"Bearer <token>"`). An
/// implementation must report every failure as an error; no method may turn
/// an unreachable peer into an empty answer.
#[async_trait]
pub trait ClassDirectory: Send + Sync {
    async fn subject_exists(&self, subject_id: &str, bearer: &str) -> FactResult<bool>;

    async fn subject(&self, subject_id: &str, bearer: &str) -> FactResult<SubjectFact>;

    async fn class_roster(&self, class_id: &str, bearer: &str) -> FactResult<ClassRoster>;

    async fn enrolled_subject_ids(&self, student_id: &str, bearer: &str) -> FactResult<Vec<String>>;
}

#[derive(Deserialize)]
struct SubjectRef {
    id: String,
}

/// `ClassDirectory` backed by the class service HTTP API.
#[derive(Clone)]
pub struct ClassServiceClient {
    fetcher: FactFetcher,
}

impl ClassServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> FactResult<Self> {
        Ok(Self {
            fetcher: FactFetcher::new(CLASS_SERVICE, base_url, timeout)?,
        })
    }

    pub fn from_fetcher(fetcher: FactFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ClassDirectory for ClassServiceClient {
    async fn subject_exists(&self, subject_id: &str, bearer: &str) -> FactResult<bool> {
        self.fetcher.probe(&["subjects", subject_id], bearer).await
    }

    async fn subject(&self, subject_id: &str, bearer: &str) -> FactResult<SubjectFact> {
        self.fetcher.fetch(&["subjects", subject_id], bearer).await
    }

    async fn class_roster(&self, class_id: &str, bearer: &str) -> FactResult<ClassRoster> {
        self.fetcher.fetch(&["classes", class_id], bearer).await
    }

    async fn enrolled_subject_ids(&self, student_id: &str, bearer: &str) -> FactResult<Vec<String>> {
        let subjects: Vec<SubjectRef> = self
            .fetcher
            .fetch(&["students", student_id, "subjects"], bearer)
            .await?;
        Ok(subjects.into_iter().map(|s| s.id).collect())
    }
}
