use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::store::{
    Assignment, AssignmentPatch, AssignmentSummary, GradeUpdate, StoreError, StoreResult, Submission,
    SubmissionStore,
};

#[derive(Default)]
struct Tables {
    assignments: HashMap<String, Assignment>,
    submissions: HashMap<String, Submission>,
}

impl Tables {
    fn has_submissions(&self, assignment_id: &str) -> bool {
        self.submissions.values().any(|s| s.assignment_id == assignment_id)
    }

    fn submissions_where<F: Fn(&Submission) -> bool>(&self, keep: F) -> Vec<Submission> {
        let mut rows: Vec<Submission> = self.submissions.values().filter(|s| keep(*s)).cloned().collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        rows
    }
}

/// Store used when no `DATABASE_URL` is configured, and by tests.
#[derive(Default)]
pub struct MemorySubmissionStore {
    tables: RwLock<Tables>,
}

impl MemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubmissionStore for MemorySubmissionStore {
    async fn create_assignment(&self, assignment: Assignment) -> StoreResult<Assignment> {
        let mut tables = self.tables.write().await;
        tables.assignments.insert(assignment.id.clone(), assignment.clone());
        Ok(assignment)
    }

    async fn get_assignment(&self, id: &str) -> StoreResult<Option<Assignment>> {
        Ok(self.tables.read().await.assignments.get(id).cloned())
    }

    async fn update_assignment(&self, id: &str, patch: AssignmentPatch) -> StoreResult<Option<Assignment>> {
        let mut tables = self.tables.write().await;
        let Some(assignment) = tables.assignments.get_mut(id) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            assignment.title = title;
        }
        if let Some(description) = patch.description {
            assignment.description = description;
        }
        if let Some(due_date) = patch.due_date {
            assignment.due_date = due_date;
        }
        if let Some(subject_id) = patch.subject_id {
            assignment.subject_id = subject_id;
        }
        assignment.updated_at = Utc::now();
        Ok(Some(assignment.clone()))
    }

    async fn delete_assignment(&self, id: &str) -> StoreResult<Option<Assignment>> {
        let mut tables = self.tables.write().await;
        let removed = tables.assignments.remove(id);
        if removed.is_some() {
            tables.submissions.retain(|_, s| s.assignment_id != id);
        }
        Ok(removed)
    }

    async fn assignments_for_teacher(&self, teacher_id: &str) -> StoreResult<Vec<AssignmentSummary>> {
        let tables = self.tables.read().await;
        let mut owned: Vec<&Assignment> = tables
            .assignments
            .values()
            .filter(|a| a.teacher_id == teacher_id)
            .collect();
        owned.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        Ok(owned
            .into_iter()
            .map(|a| {
                let submissions = tables.submissions_where(|s| s.assignment_id == a.id);
                AssignmentSummary {
                    id: a.id.clone(),
                    title: a.title.clone(),
                    due_date: a.due_date,
                    submissions_count: submissions.len() as i64,
                    ungraded_count: submissions.iter().filter(|s| s.grade.is_none()).count() as i64,
                }
            })
            .collect())
    }

    async fn assignments_for_subjects(&self, subject_ids: &[String]) -> StoreResult<Vec<Assignment>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Assignment> = tables
            .assignments
            .values()
            .filter(|a| subject_ids.contains(&a.subject_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        Ok(rows)
    }

    async fn list_submissions(&self) -> StoreResult<Vec<Submission>> {
        Ok(self.tables.read().await.submissions_where(|_| true))
    }

    async fn submissions_for_student(&self, student_id: &str) -> StoreResult<Vec<Submission>> {
        Ok(self.tables.read().await.submissions_where(|s| s.student_id == student_id))
    }

    async fn submissions_for_assignment(&self, assignment_id: &str) -> StoreResult<Vec<Submission>> {
        Ok(self
            .tables
            .read()
            .await
            .submissions_where(|s| s.assignment_id == assignment_id))
    }

    async fn get_submission(&self, id: &str) -> StoreResult<Option<Submission>> {
        Ok(self.tables.read().await.submissions.get(id).cloned())
    }

    async fn create_submission(&self, submission: Submission) -> StoreResult<Submission> {
        let mut tables = self.tables.write().await;
        if !tables.assignments.contains_key(&submission.assignment_id) {
            return Err(StoreError::MissingAssignment(submission.assignment_id));
        }
        tables.submissions.insert(submission.id.clone(), submission.clone());
        Ok(submission)
    }

    async fn grade_submission(&self, id: &str, grade: GradeUpdate) -> StoreResult<Option<Submission>> {
        let mut tables = self.tables.write().await;
        let Some(submission) = tables.submissions.get_mut(id) else {
            return Ok(None);
        };
        submission.grade = Some(grade.grade);
        submission.feedback_comment = grade.comment;
        submission.updated_at = Utc::now();
        Ok(Some(submission.clone()))
    }

    async fn find_orphans(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        let mut orphans: Vec<&Assignment> = tables
            .assignments
            .values()
            .filter(|a| a.created_at < cutoff && !tables.has_submissions(&a.id))
            .collect();
        orphans.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orphans.into_iter().map(|a| a.id.clone()).collect())
    }

    async fn delete_orphan(&self, id: &str, cutoff: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let eligible = tables
            .assignments
            .get(id)
            .is_some_and(|a| a.created_at < cutoff)
            && !tables.has_submissions(id);
        if eligible {
            tables.assignments.remove(id);
        }
        Ok(eligible)
    }
}
