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
use crate::store::{normalize_ids, Class, ClassPatch, Subject};
use crate::subject_handlers::required_name;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub name: String,
    #[serde(default)]
    pub subject_ids: Vec<String>,
    #[serde(default)]
    pub student_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClass {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subject_ids: Option<Vec<String>>,
    #[serde(default)]
    pub student_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSubject {
    pub subject_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddStudent {
    pub student_id: String,
}

fn class_not_found() -> ApiError {
    ApiError::not_found("class_not_found")
}

/// Classes may only link subjects this service already stores.
async fn ensure_subjects_exist(state: &AppState, ids: &[String]) -> ApiResult<()> {
    let missing = state.store.missing_subjects(ids).await?;
    if missing.is_empty() {
        return Ok(());
    }
    Err(ApiError::bad_request(
        "unknown_subject",
        format!("unknown subject ids: {}", missing.join(", ")),
    ))
}

fn required_id(value: &str, code: &'static str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(code, "id must not be empty"));
    }
    Ok(trimmed.to_string())
}

pub async fn create_class(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<NewClass>,
) -> ApiResult<(StatusCode, Json<Class>)> {
    require_role(auth.principal(), &[Role::Admin])?;
    let name = required_name(&body.name, "invalid_name")?;
    let subject_ids = normalize_ids(body.subject_ids);
    ensure_subjects_exist(&state, &subject_ids).await?;

    let now = Utc::now();
    let class = state
        .store
        .create_class(Class {
            id: Uuid::new_v4().to_string(),
            name,
            student_ids: normalize_ids(body.student_ids),
            subject_ids,
            created_at: now,
            updated_at: now,
        })
        .await?;
    info!(class_id = %class.id, subjects = class.subject_ids.len(), students = class.student_ids.len(), "created class");
    Ok((StatusCode::CREATED, Json(class)))
}

pub async fn list_classes(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<Class>>> {
    require_role(auth.principal(), &[Role::Admin])?;
    Ok(Json(state.store.list_classes().await?))
}

pub async fn get_class(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Class>> {
    require_role(auth.principal(), &[Role::Admin, Role::Teacher])?;
    let class = state.store.get_class(&id).await?.ok_or_else(class_not_found)?;
    Ok(Json(class))
}

pub async fn update_class(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<UpdateClass>,
) -> ApiResult<Json<Class>> {
    require_role(auth.principal(), &[Role::Admin])?;
    let subject_ids = body.subject_ids.map(normalize_ids);
    if let Some(ids) = &subject_ids {
        ensure_subjects_exist(&state, ids).await?;
    }
    let patch = ClassPatch {
        name: body
            .name
            .as_deref()
            .map(|name| required_name(name, "invalid_name"))
            .transpose()?,
        student_ids: body.student_ids.map(normalize_ids),
        subject_ids,
    };
    let class = state
        .store
        .update_class(&id, patch)
        .await?
        .ok_or_else(class_not_found)?;
    info!(class_id = %class.id, "updated class");
    Ok(Json(class))
}

pub async fn delete_class(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Class>> {
    require_role(auth.principal(), &[Role::Admin])?;
    let class = state.store.delete_class(&id).await?.ok_or_else(class_not_found)?;
    info!(class_id = %class.id, "deleted class");
    Ok(Json(class))
}

pub async fn list_class_subjects(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Subject>>> {
    require_role(auth.principal(), &[Role::Admin])?;
    let class = state.store.get_class(&id).await?.ok_or_else(class_not_found)?;
    let mut subjects = Vec::with_capacity(class.subject_ids.len());
    for subject_id in &class.subject_ids {
        if let Some(subject) = state.store.get_subject(subject_id).await? {
            subjects.push(subject);
        }
    }
    Ok(Json(subjects))
}

pub async fn add_subject_to_class(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<AddSubject>,
) -> ApiResult<Json<Class>> {
    require_role(auth.principal(), &[Role::Admin])?;
    let subject_id = required_id(&body.subject_id, "invalid_subject_id")?;
    ensure_subjects_exist(&state, std::slice::from_ref(&subject_id)).await?;
    let class = state
        .store
        .add_subject_to_class(&id, &subject_id)
        .await?
        .ok_or_else(class_not_found)?;
    info!(class_id = %class.id, subject_id = %subject_id, "linked subject to class");
    Ok(Json(class))
}

pub async fn add_student_to_class(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(body): Json<AddStudent>,
) -> ApiResult<Json<Class>> {
    require_role(auth.principal(), &[Role::Admin])?;
    let student_id = required_id(&body.student_id, "invalid_student_id")?;
    let class = state
        .store
        .add_student_to_class(&id, &student_id)
        .await?
        .ok_or_else(class_not_found)?;
    info!(class_id = %class.id, student_id = %student_id, "enrolled student in class");
    Ok(Json(class))
}
