use axum::{
    extract::{Path, State},
    Json,
};
use common_auth::{AuthContext, Role};
use common_http_errors::ApiResult;
use common_security::{require_ownership, require_role};

use crate::app::AppState;
use crate::store::{Class, Subject};

/// Staff may read any student's subjects; a student only their own.
pub async fn student_subjects(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(student_id): Path<String>,
) -> ApiResult<Json<Vec<Subject>>> {
    let principal = auth.principal();
    if principal.role == Role::Student {
        require_ownership(principal, &student_id)?;
    }
    Ok(Json(state.store.subjects_for_student(&student_id).await?))
}

pub async fn my_classes(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<Class>>> {
    require_role(auth.principal(), &[Role::Student])?;
    Ok(Json(state.store.classes_for_student(&auth.principal().id).await?))
}
