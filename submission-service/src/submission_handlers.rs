use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use common_auth::{AuthContext, Role};
use common_http_errors::{ApiError, ApiResult};
use common_security::{require_role, Action, Target};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::assignment_handlers::{assignment_target, load_assignment, required_text};
use crate::store::{Assignment, GradeUpdate, Submission};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubmission {
    pub assignment_id: String,
    pub file_path: String,
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub grade: f64,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterFilter {
    #[serde(default)]
    pub class_id: Option<String>,
}

pub(crate) fn validate_grade(grade: f64) -> ApiResult<f64> {
    if !grade.is_finite() || !(0.0..=100.0).contains(&grade) {
        return Err(ApiError::bad_request(
            "invalid_grade",
            "grade must be a number between 0 and 100",
        ));
    }
    Ok(grade)
}

async fn load_submission(state: &AppState, id: &str) -> ApiResult<(Submission, Assignment)> {
    let submission = state
        .store
        .get_submission(id)
        .await?
        .ok_or(ApiError::not_found("submission_not_found"))?;
    let assignment = load_assignment(state, &submission.assignment_id).await?;
    Ok((submission, assignment))
}

fn submission_target<'a>(submission: &'a Submission, assignment: &'a Assignment) -> Target<'a> {
    Target::Submission {
        student_id: &submission.student_id,
        teacher_id: &assignment.teacher_id,
        subject_id: &assignment.subject_id,
    }
}

pub async fn list_submissions(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<Submission>>> {
    require_role(auth.principal(), &[Role::Admin])?;
    Ok(Json(state.store.list_submissions().await?))
}

pub async fn my_submissions(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<Submission>>> {
    require_role(auth.principal(), &[Role::Student])?;
    Ok(Json(
        state
            .store
            .submissions_for_student(&auth.principal().id)
            .await?,
    ))
}

/// Submissions to one assignment, optionally narrowed to a class roster.
pub async fn assignment_submissions(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Query(filter): Query<RosterFilter>,
) -> ApiResult<Json<Vec<Submission>>> {
    let assignment = load_assignment(&state, &id).await?;
    state
        .authorize(
            &auth,
            &[Role::Admin, Role::Teacher],
            assignment_target(&assignment),
            Action::Read,
        )
        .await?;
    let mut submissions = state.store.submissions_for_assignment(&assignment.id).await?;

    if let Some(class_id) = filter.class_id.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        let roster = state.directory.class_roster(class_id, &auth.bearer()).await?;
        submissions.retain(|s| roster.has_student(&s.student_id));
    }
    Ok(Json(submissions))
}

pub async fn create_submission(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<NewSubmission>,
) -> ApiResult<(StatusCode, Json<Submission>)> {
    let principal = auth.principal();
    require_role(principal, &[Role::Student])?;
    let file_path = required_text(&body.file_path, "invalid_file_path")?;
    let assignment = load_assignment(&state, body.assignment_id.trim()).await?;
    state
        .authorize(
            &auth,
            &[Role::Student],
            assignment_target(&assignment),
            Action::Read,
        )
        .await?;

    let now = Utc::now();
    let submission = state
        .store
        .create_submission(Submission {
            id: Uuid::new_v4().to_string(),
            assignment_id: assignment.id.clone(),
            student_id: principal.id.clone(),
            file_path,
            feedback_path: None,
            feedback_comment: None,
            grade: None,
            created_at: now,
            updated_at: now,
        })
        .await?;
    info!(
        submission_id = %submission.id,
        assignment_id = %submission.assignment_id,
        student_id = %submission.student_id,
        "created submission"
    );
    Ok((StatusCode::CREATED, Json(submission)))
}

pub async fn get_submission(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Submission>> {
    let (submission, assignment) = load_submission(&state, &id).await?;
    state
        .authorize(&auth, &[], submission_target(&submission, &assignment), Action::Read)
        .await?;
    Ok(Json(submission))
}

pub async fn grade_submission(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<GradeRequest>,
) -> ApiResult<Json<Submission>> {
    let grade = validate_grade(body.grade)?;
    let (submission, assignment) = load_submission(&state, &id).await?;
    state
        .authorize(
            &auth,
            &[Role::Admin, Role::Teacher],
            submission_target(&submission, &assignment),
            Action::Mutate,
        )
        .await?;

    let graded = state
        .store
        .grade_submission(
            &submission.id,
            GradeUpdate {
                grade,
                comment: body
                    .comment
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty()),
            },
        )
        .await?
        .ok_or(ApiError::not_found("submission_not_found"))?;
    info!(
        submission_id = %graded.id,
        grade,
        graded_by = %auth.principal().id,
        "graded submission"
    );
    Ok(Json(graded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_bounds_are_inclusive() {
        assert_eq!(validate_grade(0.0).unwrap(), 0.0);
        assert_eq!(validate_grade(100.0).unwrap(), 100.0);
        assert_eq!(validate_grade(72.5).unwrap(), 72.5);
    }

    #[test]
    fn out_of_range_or_non_finite_grades_are_rejected() {
        for grade in [-0.5, 100.01, f64::NAN, f64::INFINITY] {
            let err = validate_grade(grade).unwrap_err();
            assert_eq!(err.code(), "invalid_grade");
        }
    }
}
