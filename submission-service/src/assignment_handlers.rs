use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use common_auth::{AuthContext, Role};
use common_facts::{FactError, SubjectFact};
use common_http_errors::{ApiError, ApiResult};
use common_security::{require_role, AccessDenied, Action, Target};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::store::{Assignment, AssignmentPatch, AssignmentSummary, Submission};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub subject_id: String,
    /// Required for admins and must name a teacher of the subject; a teacher
    /// always owns what they create.
    #[serde(default)]
    pub teacher_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssignment {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subject_id: Option<String>,
}

/// Assignment plus the subject fetched while authorizing, when there was one.
#[derive(Debug, Serialize)]
pub struct AssignmentView {
    #[serde(flatten)]
    pub assignment: Assignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectFact>,
}

#[derive(Debug, Serialize)]
pub struct StudentAssignment {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub submissions: Vec<Submission>,
}

pub(crate) fn required_text(value: &str, code: &'static str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(code, "value must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Blank text means "no value".
fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub(crate) fn assignment_target(assignment: &Assignment) -> Target<'_> {
    Target::Assignment {
        teacher_id: &assignment.teacher_id,
        subject_id: &assignment.subject_id,
    }
}

pub(crate) async fn load_assignment(state: &AppState, id: &str) -> ApiResult<Assignment> {
    state
        .store
        .get_assignment(id)
        .await?
        .ok_or(ApiError::not_found("assignment_not_found"))
}

fn invalid_subject() -> ApiError {
    ApiError::bad_request("invalid_subject_id", "subject does not exist")
}

/// A subject the class service does not know is a client error here.
fn subject_lookup(err: AccessDenied) -> ApiError {
    match err {
        AccessDenied::Remote(FactError::NotFound { .. }) => invalid_subject(),
        other => other.into(),
    }
}

pub async fn create_assignment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<NewAssignment>,
) -> ApiResult<(StatusCode, Json<AssignmentView>)> {
    let title = required_text(&body.title, "invalid_title")?;
    let subject_id = required_text(&body.subject_id, "invalid_subject_id")?;
    let principal = auth.principal();

    let grant = state
        .authorize(
            &auth,
            &[Role::Admin, Role::Teacher],
            Target::Subject {
                subject_id: &subject_id,
            },
            Action::Mutate,
        )
        .await
        .map_err(subject_lookup)?;

    let (teacher_id, subject) = if principal.is_admin() {
        let teacher_id = body
            .teacher_id
            .as_deref()
            .and_then(optional_text)
            .ok_or_else(|| ApiError::bad_request("invalid_teacher_id", "teacherId is required"))?;
        let subject = match state.directory.subject(&subject_id, &auth.bearer()).await {
            Ok(subject) => subject,
            Err(FactError::NotFound { .. }) => return Err(invalid_subject()),
            Err(err) => return Err(err.into()),
        };
        if !subject.is_taught_by(&teacher_id) {
            return Err(ApiError::bad_request(
                "invalid_teacher_id",
                "teacher does not teach this subject",
            ));
        }
        (teacher_id, Some(subject))
    } else {
        if body.teacher_id.as_deref().is_some_and(|id| id.trim() != principal.id) {
            return Err(ApiError::forbidden(
                "not_owner",
                "teachers can only create their own assignments",
            ));
        }
        (principal.id.clone(), grant.subject)
    };

    let now = Utc::now();
    let assignment = state
        .store
        .create_assignment(Assignment {
            id: Uuid::new_v4().to_string(),
            title,
            description: body.description.as_deref().and_then(optional_text),
            due_date: body.due_date,
            subject_id,
            teacher_id,
            created_at: now,
            updated_at: now,
        })
        .await?;
    info!(
        assignment_id = %assignment.id,
        subject_id = %assignment.subject_id,
        teacher_id = %assignment.teacher_id,
        created_by = %principal.id,
        "created assignment"
    );
    Ok((
        StatusCode::CREATED,
        Json(AssignmentView { assignment, subject }),
    ))
}

pub async fn get_assignment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<AssignmentView>> {
    let assignment = load_assignment(&state, &id).await?;
    let grant = state
        .authorize(&auth, &[], assignment_target(&assignment), Action::Read)
        .await?;
    Ok(Json(AssignmentView {
        assignment,
        subject: grant.subject,
    }))
}

pub async fn update_assignment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<UpdateAssignment>,
) -> ApiResult<Json<AssignmentView>> {
    let current = load_assignment(&state, &id).await?;
    let grant = state
        .authorize(
            &auth,
            &[Role::Admin, Role::Teacher],
            assignment_target(&current),
            Action::Mutate,
        )
        .await?;

    let title = body
        .title
        .as_deref()
        .map(|t| required_text(t, "invalid_title"))
        .transpose()?;
    let new_subject = body
        .subject_id
        .as_deref()
        .map(|s| required_text(s, "invalid_subject_id"))
        .transpose()?
        .filter(|s| *s != current.subject_id);

    if let Some(subject_id) = &new_subject {
        if !auth.principal().is_admin() {
            return Err(ApiError::forbidden(
                "subject_change_forbidden",
                "teachers cannot move an assignment to another subject",
            ));
        }
        if !state.directory.subject_exists(subject_id, &auth.bearer()).await? {
            return Err(invalid_subject());
        }
    }

    let subject_changed = new_subject.is_some();
    let assignment = state
        .store
        .update_assignment(
            &id,
            AssignmentPatch {
                title,
                description: body.description.as_deref().map(optional_text),
                due_date: body.due_date,
                subject_id: new_subject,
            },
        )
        .await?
        .ok_or(ApiError::not_found("assignment_not_found"))?;
    info!(
        assignment_id = %assignment.id,
        updated_by = %auth.principal().id,
        subject_changed,
        "updated assignment"
    );
    Ok(Json(AssignmentView {
        assignment,
        subject: if subject_changed { None } else { grant.subject },
    }))
}

pub async fn delete_assignment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Assignment>> {
    let current = load_assignment(&state, &id).await?;
    state
        .authorize(
            &auth,
            &[Role::Admin, Role::Teacher],
            assignment_target(&current),
            Action::Mutate,
        )
        .await?;
    let assignment = state
        .store
        .delete_assignment(&id)
        .await?
        .ok_or(ApiError::not_found("assignment_not_found"))?;
    info!(assignment_id = %assignment.id, deleted_by = %auth.principal().id, "deleted assignment");
    Ok(Json(assignment))
}

/// Teacher overview with submission counts.
pub async fn my_assignments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<AssignmentSummary>>> {
    require_role(auth.principal(), &[Role::Teacher])?;
    Ok(Json(
        state
            .store
            .assignments_for_teacher(&auth.principal().id)
            .await?,
    ))
}

pub async fn subject_assignments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(subject_id): Path<String>,
) -> ApiResult<Json<Vec<Assignment>>> {
    state
        .authorize(
            &auth,
            &[],
            Target::Subject {
                subject_id: &subject_id,
            },
            Action::Read,
        )
        .await?;
    Ok(Json(state.store.assignments_for_subjects(&[subject_id]).await?))
}

/// Assignments of every subject the student is currently enrolled in, each
/// with the student's own submissions.
pub async fn student_assignments(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<StudentAssignment>>> {
    let principal = auth.principal();
    require_role(principal, &[Role::Student])?;

    let subject_ids = state
        .directory
        .enrolled_subject_ids(&principal.id, &auth.bearer())
        .await?;
    let assignments = state.store.assignments_for_subjects(&subject_ids).await?;
    let mut submissions = state.store.submissions_for_student(&principal.id).await?;

    Ok(Json(
        assignments
            .into_iter()
            .map(|assignment| {
                let (mine, rest): (Vec<_>, Vec<_>) = submissions
                    .drain(..)
                    .partition(|s| s.assignment_id == assignment.id);
                submissions = rest;
                StudentAssignment {
                    assignment,
                    submissions: mine,
                }
            })
            .collect(),
    ))
}
