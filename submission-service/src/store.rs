use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_http_errors::ApiError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("assignment {0} does not exist")]
    MissingAssignment(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::MissingAssignment(_) => ApiError::not_found("assignment_not_found"),
            other => ApiError::internal(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub subject_id: String,
    pub teacher_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_comment: Option<String>,
    pub grade: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of a teacher's assignment overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSummary {
    pub id: String,
    pub title: String,
    pub due_date: DateTime<Utc>,
    pub submissions_count: i64,
    pub ungraded_count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentPatch {
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub due_date: Option<DateTime<Utc>>,
    pub subject_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GradeUpdate {
    pub grade: f64,
    pub comment: Option<String>,
}

/// Persistence for assignments and their submissions.
///
/// Subject, teacher and student ids are opaque references to other services
/// and are never checked here.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn create_assignment(&self, assignment: Assignment) -> StoreResult<Assignment>;
    async fn get_assignment(&self, id: &str) -> StoreResult<Option<Assignment>>;
    async fn update_assignment(&self, id: &str, patch: AssignmentPatch) -> StoreResult<Option<Assignment>>;
    /// Removes the assignment and every submission to it.
    async fn delete_assignment(&self, id: &str) -> StoreResult<Option<Assignment>>;
    /// Ordered by due date, earliest first.
    async fn assignments_for_teacher(&self, teacher_id: &str) -> StoreResult<Vec<AssignmentSummary>>;
    /// Ordered by due date, earliest first.
    async fn assignments_for_subjects(&self, subject_ids: &[String]) -> StoreResult<Vec<Assignment>>;

    async fn list_submissions(&self) -> StoreResult<Vec<Submission>>;
    async fn submissions_for_student(&self, student_id: &str) -> StoreResult<Vec<Submission>>;
    async fn submissions_for_assignment(&self, assignment_id: &str) -> StoreResult<Vec<Submission>>;
    async fn get_submission(&self, id: &str) -> StoreResult<Option<Submission>>;
    /// Fails with `MissingAssignment` when the assignment is gone.
    async fn create_submission(&self, submission: Submission) -> StoreResult<Submission>;
    async fn grade_submission(&self, id: &str, grade: GradeUpdate) -> StoreResult<Option<Submission>>;

    /// Ids of assignments created before `cutoff` that have no submissions.
    async fn find_orphans(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<String>>;
    /// Deletes the assignment only if it is still older than `cutoff` and
    /// still has no submissions. Returns whether a row was removed.
    async fn delete_orphan(&self, id: &str, cutoff: DateTime<Utc>) -> StoreResult<bool>;
}
