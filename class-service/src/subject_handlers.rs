use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use common_auth::{AuthContext, Role};
use common_http_errors::{ApiError, ApiResult};
use common_security::require_role;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::store::{normalize_ids, Subject, SubjectPatch};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubject {
    pub name: String,
    #[serde(default)]
    pub teacher_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubject {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub teacher_ids: Option<Vec<String>>,
}

pub(crate) fn required_name(name: &str, code: &'static str) -> ApiResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(code, "name must not be empty"));
    }
    Ok(trimmed.to_string())
}

pub async fn create_subject(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<NewSubject>,
) -> ApiResult<(StatusCode, Json<Subject>)> {
    require_role(auth.principal(), &[Role::Admin])?;
    let now = Utc::now();
    let subject = state
        .store
        .create_subject(Subject {
            id: Uuid::new_v4().to_string(),
            name: required_name(&body.name, "invalid_name")?,
            teacher_ids: normalize_ids(body.teacher_ids),
            created_at: now,
            updated_at: now,
        })
        .await?;
    info!(subject_id = %subject.id, teachers = subject.teacher_ids.len(), "created subject");
    Ok((StatusCode::CREATED, Json(subject)))
}

pub async fn list_subjects(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<Subject>>> {
    require_role(auth.principal(), &[Role::Admin, Role::Teacher])?;
    Ok(Json(state.store.list_subjects().await?))
}

/// Open to every authenticated role; peer services read teacher membership here.
pub async fn get_subject(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Subject>> {
    let subject = state
        .store
        .get_subject(&id)
        .await?
        .ok_or(ApiError::not_found("subject_not_found"))?;
    Ok(Json(subject))
}

pub async fn update_subject(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<UpdateSubject>,
) -> ApiResult<Json<Subject>> {
    require_role(auth.principal(), &[Role::Admin])?;
    let patch = SubjectPatch {
        name: body
            .name
            .as_deref()
            .map(|name| required_name(name, "invalid_name"))
            .transpose()?,
        teacher_ids: body.teacher_ids.map(normalize_ids),
    };
    let subject = state
        .store
        .update_subject(&id, patch)
        .await?
        .ok_or(ApiError::not_found("subject_not_found"))?;
    info!(subject_id = %subject.id, teachers = ?subject.teacher_ids, "updated subject");
    Ok(Json(subject))
}

pub async fn delete_subject(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Subject>> {
    require_role(auth.principal(), &[Role::Admin])?;
    let subject = state
        .store
        .delete_subject(&id)
        .await?
        .ok_or(ApiError::not_found("subject_not_found"))?;
    info!(subject_id = %subject.id, "deleted subject");
    Ok(Json(subject))
}
