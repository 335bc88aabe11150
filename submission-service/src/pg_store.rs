use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::store::{
    Assignment, AssignmentPatch, AssignmentSummary, GradeUpdate, StoreError, StoreResult, Submission,
    SubmissionStore,
};

#[derive(FromRow)]
struct AssignmentRow {
    id: String,
    title: String,
    description: Option<String>,
    due_date: DateTime<Utc>,
    subject_id: String,
    teacher_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AssignmentRow> for Assignment {
    fn from(row: AssignmentRow) -> Self {
        Assignment {
            id: row.id,
            title: row.title,
            description: row.description,
            due_date: row.due_date,
            subject_id: row.subject_id,
            teacher_id: row.teacher_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SubmissionRow {
    id: String,
    assignment_id: String,
    student_id: String,
    file_path: String,
    feedback_path: Option<String>,
    feedback_comment: Option<String>,
    grade: Option<f64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Submission {
            id: row.id,
            assignment_id: row.assignment_id,
            student_id: row.student_id,
            file_path: row.file_path,
            feedback_path: row.feedback_path,
            feedback_comment: row.feedback_comment,
            grade: row.grade,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SummaryRow {
    id: String,
    title: String,
    due_date: DateTime<Utc>,
    submissions_count: i64,
    ungraded_count: i64,
}

const ASSIGNMENT_COLUMNS: &str =
    "id, title, description, due_date, subject_id, teacher_id, created_at, updated_at";

const SUBMISSION_COLUMNS: &str =
    "id, assignment_id, student_id, file_path, feedback_path, feedback_comment, grade, created_at, updated_at";

pub struct PgSubmissionStore {
    pool: PgPool,
}

impl PgSubmissionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn submissions_query(&self, filter: &str, arg: Option<&str>) -> StoreResult<Vec<Submission>> {
        let sql = format!("SELECT {SUBMISSION_COLUMNS} FROM submissions {filter} ORDER BY created_at, id");
        let mut query = sqlx::query_as::<_, SubmissionRow>(&sql);
        if let Some(arg) = arg {
            query = query.bind(arg);
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Submission::from).collect())
    }
}

#[async_trait]
impl SubmissionStore for PgSubmissionStore {
    async fn create_assignment(&self, assignment: Assignment) -> StoreResult<Assignment> {
        sqlx::query(
            "INSERT INTO assignments (id, title, description, due_date, subject_id, teacher_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&assignment.id)
        .bind(&assignment.title)
        .bind(&assignment.description)
        .bind(assignment.due_date)
        .bind(&assignment.subject_id)
        .bind(&assignment.teacher_id)
        .bind(assignment.created_at)
        .bind(assignment.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(assignment)
    }

    async fn get_assignment(&self, id: &str) -> StoreResult<Option<Assignment>> {
        let row = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Assignment::from))
    }

    async fn update_assignment(&self, id: &str, patch: AssignmentPatch) -> StoreResult<Option<Assignment>> {
        let row = sqlx::query_as::<_, AssignmentRow>(&format!(
            "UPDATE assignments SET
                 title = COALESCE($2, title),
                 description = CASE WHEN $3 THEN $4 ELSE description END,
                 due_date = COALESCE($5, due_date),
                 subject_id = COALESCE($6, subject_id),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.title)
        .bind(patch.description.is_some())
        .bind(patch.description.flatten())
        .bind(patch.due_date)
        .bind(patch.subject_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Assignment::from))
    }

    async fn delete_assignment(&self, id: &str) -> StoreResult<Option<Assignment>> {
        let row = sqlx::query_as::<_, AssignmentRow>(&format!(
            "DELETE FROM assignments WHERE id = $1 RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Assignment::from))
    }

    async fn assignments_for_teacher(&self, teacher_id: &str) -> StoreResult<Vec<AssignmentSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            "SELECT a.id, a.title, a.due_date,
                    COUNT(s.id) AS submissions_count,
                    COUNT(s.id) FILTER (WHERE s.grade IS NULL) AS ungraded_count
             FROM assignments a
             LEFT JOIN submissions s ON s.assignment_id = a.id
             WHERE a.teacher_id = $1
             GROUP BY a.id
             ORDER BY a.due_date ASC",
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| AssignmentSummary {
                id: row.id,
                title: row.title,
                due_date: row.due_date,
                submissions_count: row.submissions_count,
                ungraded_count: row.ungraded_count,
            })
            .collect())
    }

    async fn assignments_for_subjects(&self, subject_ids: &[String]) -> StoreResult<Vec<Assignment>> {
        if subject_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE subject_id = ANY($1) ORDER BY due_date ASC"
        ))
        .bind(subject_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Assignment::from).collect())
    }

    async fn list_submissions(&self) -> StoreResult<Vec<Submission>> {
        self.submissions_query("", None).await
    }

    async fn submissions_for_student(&self, student_id: &str) -> StoreResult<Vec<Submission>> {
        self.submissions_query("WHERE student_id = $1", Some(student_id)).await
    }

    async fn submissions_for_assignment(&self, assignment_id: &str) -> StoreResult<Vec<Submission>> {
        self.submissions_query("WHERE assignment_id = $1", Some(assignment_id))
            .await
    }

    async fn get_submission(&self, id: &str) -> StoreResult<Option<Submission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Submission::from))
    }

    async fn create_submission(&self, submission: Submission) -> StoreResult<Submission> {
        let result = sqlx::query(
            "INSERT INTO submissions (id, assignment_id, student_id, file_path, feedback_path, feedback_comment, grade, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&submission.id)
        .bind(&submission.assignment_id)
        .bind(&submission.student_id)
        .bind(&submission.file_path)
        .bind(&submission.feedback_path)
        .bind(&submission.feedback_comment)
        .bind(submission.grade)
        .bind(submission.created_at)
        .bind(submission.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(submission),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(StoreError::MissingAssignment(submission.assignment_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn grade_submission(&self, id: &str, grade: GradeUpdate) -> StoreResult<Option<Submission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "UPDATE submissions SET grade = $2, feedback_comment = $3, updated_at = NOW()
             WHERE id = $1
             RETURNING {SUBMISSION_COLUMNS}"
        ))
        .bind(id)
        .bind(grade.grade)
        .bind(grade.comment)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Submission::from))
    }

    async fn find_orphans(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT a.id FROM assignments a
             WHERE a.created_at < $1
               AND NOT EXISTS (SELECT 1 FROM submissions s WHERE s.assignment_id = a.id)
             ORDER BY a.created_at",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn delete_orphan(&self, id: &str, cutoff: DateTime<Utc>) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        // Row lock conflicts with the key-share lock a concurrent submission
        // insert holds, so the emptiness check below sees committed inserts.
        let locked = sqlx::query_scalar::<_, String>(
            "SELECT id FROM assignments WHERE id = $1 AND created_at < $2 FOR UPDATE",
        )
        .bind(id)
        .bind(cutoff)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Ok(false);
        }
        let deleted = sqlx::query(
            "DELETE FROM assignments a WHERE a.id = $1
               AND NOT EXISTS (SELECT 1 FROM submissions s WHERE s.assignment_id = a.id)",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }
}
