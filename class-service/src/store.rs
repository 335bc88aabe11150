use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_http_errors::ApiError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        ApiError::internal(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub teacher_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    pub student_ids: Vec<String>,
    pub subject_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SubjectPatch {
    pub name: Option<String>,
    pub teacher_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct ClassPatch {
    pub name: Option<String>,
    pub student_ids: Option<Vec<String>>,
    pub subject_ids: Option<Vec<String>>,
}

/// Persistence for subjects, classes and the links between them.
///
/// Lookups by id return `Ok(None)` when nothing matches; mutations return the
/// row as it is after the change, or as it was before a delete.
#[async_trait]
pub trait ClassStore: Send + Sync {
    async fn create_subject(&self, subject: Subject) -> StoreResult<Subject>;
    async fn list_subjects(&self) -> StoreResult<Vec<Subject>>;
    async fn get_subject(&self, id: &str) -> StoreResult<Option<Subject>>;
    async fn update_subject(&self, id: &str, patch: SubjectPatch) -> StoreResult<Option<Subject>>;
    async fn delete_subject(&self, id: &str) -> StoreResult<Option<Subject>>;
    /// Ids from `ids` that name no stored subject.
    async fn missing_subjects(&self, ids: &[String]) -> StoreResult<Vec<String>>;

    async fn create_class(&self, class: Class) -> StoreResult<Class>;
    async fn list_classes(&self) -> StoreResult<Vec<Class>>;
    async fn get_class(&self, id: &str) -> StoreResult<Option<Class>>;
    async fn update_class(&self, id: &str, patch: ClassPatch) -> StoreResult<Option<Class>>;
    async fn delete_class(&self, id: &str) -> StoreResult<Option<Class>>;
    async fn add_subject_to_class(&self, class_id: &str, subject_id: &str) -> StoreResult<Option<Class>>;
    async fn add_student_to_class(&self, class_id: &str, student_id: &str) -> StoreResult<Option<Class>>;

    /// Subjects of every class the student belongs to, without duplicates.
    async fn subjects_for_student(&self, student_id: &str) -> StoreResult<Vec<Subject>>;
    async fn classes_for_student(&self, student_id: &str) -> StoreResult<Vec<Class>>;
}

/// Trim, drop blanks and duplicates, keep first-seen order.
pub fn normalize_ids(ids: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim();
        if !id.is_empty() && !out.iter().any(|seen| seen == id) {
            out.push(id.to_string());
        }
    }
    out
}
