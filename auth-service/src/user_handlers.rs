use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, Json};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use common_auth::{AuthContext, Principal, Role};
use common_http_errors::{ApiError, ApiResult};
use common_security::require_role;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::BootstrapAdmin;
use crate::store::{normalize_email, UserRecord, UserStore};
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
    pub refresh_token: String,
    pub refresh_expires_in: i64,
    pub user: UserView,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub token: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub role: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: UserView,
    /// Only present when the server generated the password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temporary_password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for UserView {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            first_name: user.first_name,
            middle_name: user.middle_name,
            last_name: user.last_name,
            created_at: user.created_at,
        }
    }
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized {
        code: "invalid_credentials",
        message: Some("invalid credentials".into()),
    }
}

pub async fn login_user(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request(
            "missing_credentials",
            "email and password are required",
        ));
    }

    let Some(user) = state.users.find_by_email(&req.email).await? else {
        state.metrics.login_attempt("unknown_user");
        warn!(email = %normalize_email(&req.email), "login for unknown email");
        return Err(invalid_credentials());
    };

    if !verify_password(&req.password, &user.password_hash) {
        state.metrics.login_attempt("bad_password");
        warn!(user_id = %user.id, "login with wrong password");
        return Err(invalid_credentials());
    }

    let principal = Principal::new(user.id.clone(), user.role);
    let issued = state.codec.issue_default(&principal).map_err(ApiError::internal)?;
    let refresh = state.codec.issue_refresh(&principal).map_err(ApiError::internal)?;
    state.metrics.login_attempt("success");
    info!(user_id = %user.id, role = %user.role, "issued token");

    Ok(Json(LoginResponse {
        token: issued.token,
        expires_in: issued.expires_in,
        refresh_token: refresh.token,
        refresh_expires_in: refresh.expires_in,
        user: user.into(),
    }))
}

fn invalid_refresh_token() -> ApiError {
    ApiError::Unauthorized {
        code: "invalid_refresh_token",
        message: Some("refresh token is invalid or expired".into()),
    }
}

/// Trade a refresh token for a new access token.
///
/// The user is re-read so the new token carries their current role, and a
/// deleted account cannot refresh.
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    if req.refresh_token.trim().is_empty() {
        return Err(ApiError::bad_request(
            "missing_refresh_token",
            "refreshToken is required",
        ));
    }

    let claims = state.codec.verify_refresh(req.refresh_token.trim()).map_err(|err| {
        warn!(error = %err, "refresh token rejected");
        invalid_refresh_token()
    })?;
    let Some(user) = state.users.find_by_id(&claims.principal.id).await? else {
        warn!(user_id = %claims.principal.id, "refresh for unknown user");
        return Err(invalid_refresh_token());
    };

    let issued = state
        .codec
        .issue_default(&Principal::new(user.id.clone(), user.role))
        .map_err(ApiError::internal)?;
    info!(user_id = %user.id, role = %user.role, "refreshed token");
    Ok(Json(RefreshResponse {
        token: issued.token,
        expires_in: issued.expires_in,
    }))
}

pub async fn register_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    require_role(auth.principal(), &[Role::Admin])?;

    let email = normalize_email(&req.email);
    if !is_plausible_email(&email) {
        return Err(ApiError::bad_request("invalid_email", "a valid email is required"));
    }
    let first_name = required_name(&req.first_name, "invalid_first_name")?;
    let last_name = required_name(&req.last_name, "invalid_last_name")?;
    let role = req.role.parse::<Role>().map_err(|err| {
        ApiError::bad_request("invalid_role", err.to_string())
    })?;

    let (password, temporary_password) = match req.password {
        Some(password) => (password, None),
        None => {
            let generated = generate_temp_password();
            (generated.clone(), Some(generated))
        }
    };
    let password_hash = hash_password(&password)?;

    let user = state
        .users
        .insert(UserRecord {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash,
            role,
            first_name,
            middle_name: req
                .middle_name
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            last_name,
            created_at: Utc::now(),
        })
        .await?;

    info!(user_id = %user.id, role = %user.role, created_by = %auth.principal().id, "registered user");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.into(),
            temporary_password,
        }),
    ))
}

pub async fn current_user(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<UserView>> {
    let user = state
        .users
        .find_by_id(&auth.principal().id)
        .await?
        .ok_or(ApiError::not_found("user_not_found"))?;
    Ok(Json(user.into()))
}

/// Create the configured admin unless the email is already registered.
pub async fn seed_admin(users: &dyn UserStore, admin: &BootstrapAdmin) -> ApiResult<bool> {
    if users.find_by_email(&admin.email).await?.is_some() {
        return Ok(false);
    }
    let user = users
        .insert(UserRecord {
            id: Uuid::new_v4().to_string(),
            email: normalize_email(&admin.email),
            password_hash: hash_password(&admin.password)?,
            role: Role::Admin,
            first_name: "Admin".into(),
            middle_name: None,
            last_name: "User".into(),
            created_at: Utc::now(),
        })
        .await?;
    info!(user_id = %user.id, email = %user.email, "seeded bootstrap admin");
    Ok(true)
}

fn required_name(value: &str, code: &'static str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request(code, "name must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    }
}

fn generate_temp_password() -> String {
    let mut bytes = [0u8; 12];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn hash_password(password: &str) -> ApiResult<String> {
    if password.trim().is_empty() {
        return Err(ApiError::bad_request("invalid_password", "password must not be empty"));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::internal(format!("failed to hash password: {err}")))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            warn!(error = %err, "stored password hash is unreadable");
            false
        }
    }
}
