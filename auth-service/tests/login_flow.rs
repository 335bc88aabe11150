mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common_auth::{Principal, Role};
use serde_json::json;
use support::{body_json, json_request, TestApp, ADMIN_EMAIL, ADMIN_PASSWORD};
use tower::util::ServiceExt;

#[tokio::test]
async fn login_issues_token_the_codec_verifies() {
    let app = TestApp::new().await;
    let resp = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            &json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["expiresIn"], 3600);
    assert_eq!(body["refreshExpiresIn"], 7 * 24 * 3600);
    assert_eq!(body["user"]["role"], "admin");

    let claims = app.state.codec.verify(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.principal.role, Role::Admin);
    assert_eq!(claims.principal.id, body["user"]["id"].as_str().unwrap());
    assert_eq!(app.state.metrics.login_attempts("success"), 1);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    let resp = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            &json!({ "email": ADMIN_EMAIL, "password": "nope" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), "invalid_credentials");
    assert_eq!(app.state.metrics.login_attempts("bad_password"), 1);
}

#[tokio::test]
async fn unknown_email_looks_like_wrong_password() {
    let app = TestApp::new().await;
    let resp = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            &json!({ "email": "ghost@school.test", "password": "whatever" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["code"], "invalid_credentials");
}

#[tokio::test]
async fn missing_fields_are_bad_request() {
    let app = TestApp::new().await;
    let resp = app
        .router
        .clone()
        .oneshot(json_request("POST", "/auth/login", None, &json!({ "email": ADMIN_EMAIL })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_registers_user_who_can_then_log_in() {
    let app = TestApp::new().await;
    let admin_token = app.token_for("admin-1", Role::Admin);

    let resp = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            Some(&admin_token),
            &json!({
                "email": "T1@School.test",
                "firstName": "Tess",
                "lastName": "Teacher",
                "role": "teacher"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["user"]["email"], "t1@school.test");
    let temp = body["temporaryPassword"].as_str().expect("temporary password").to_string();

    let resp = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            &json!({ "email": "t1@school.test", "password": temp }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["user"]["role"], "teacher");
}

#[tokio::test]
async fn register_with_explicit_password_returns_no_temporary_one() {
    let app = TestApp::new().await;
    let admin_token = app.token_for("admin-1", Role::Admin);
    let resp = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            Some(&admin_token),
            &json!({
                "email": "s1@school.test",
                "firstName": "Sam",
                "middleName": "  ",
                "lastName": "Student",
                "role": "student",
                "password": "chosen-password"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert!(body.get("temporaryPassword").is_none());
    assert!(body["user"].get("middleName").is_none());
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = TestApp::new().await;
    let admin_token = app.token_for("admin-1", Role::Admin);
    let resp = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            Some(&admin_token),
            &json!({
                "email": ADMIN_EMAIL,
                "firstName": "Again",
                "lastName": "Admin",
                "role": "admin"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), "email_taken");
}

#[tokio::test]
async fn teacher_cannot_register_users() {
    let app = TestApp::new().await;
    let token = app.token_for("t1", Role::Teacher);
    let resp = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            Some(&token),
            &json!({
                "email": "x@school.test",
                "firstName": "X",
                "lastName": "Y",
                "role": "student"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body = body_json(resp).await;
    assert_eq!(body["code"], "missing_role");
    assert_eq!(body["missingRole"], "admin");
}

#[tokio::test]
async fn unknown_role_is_rejected() {
    let app = TestApp::new().await;
    let admin_token = app.token_for("admin-1", Role::Admin);
    let resp = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            Some(&admin_token),
            &json!({
                "email": "p@school.test",
                "firstName": "P",
                "lastName": "Q",
                "role": "principal"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), "invalid_role");
}

#[tokio::test]
async fn me_requires_a_token_and_a_live_user() {
    let app = TestApp::new().await;

    let resp = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), "auth_header");

    let ghost = app.token_for("deleted-user", Role::Student);
    let resp = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header("authorization", format!("Bearer {ghost}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn me_returns_profile_of_token_holder() {
    let app = TestApp::new().await;
    let admin = app
        .state
        .users
        .find_by_email(ADMIN_EMAIL)
        .await
        .unwrap()
        .expect("seeded admin");
    let token = app.token_for(&admin.id, Role::Admin);
    let resp = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["email"], ADMIN_EMAIL);
    assert!(body.get("passwordHash").is_none());
}

#[tokio::test]
async fn error_responses_are_counted() {
    let app = TestApp::new().await;
    app.router
        .clone()
        .oneshot(Request::builder().uri("/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let resp = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = http_body_util::BodyExt::collect(resp.into_body()).await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains(r#"http_errors_total{code="auth_header",service="auth-service",status="401"} 1"#));
}

async fn login_as_admin(app: &TestApp) -> serde_json::Value {
    let resp = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            None,
            &json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    body_json(resp).await
}

#[tokio::test]
async fn refresh_token_yields_a_new_access_token() {
    let app = TestApp::new().await;
    let login = login_as_admin(&app).await;
    let refresh = login["refreshToken"].as_str().unwrap();

    let resp = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/refresh",
            None,
            &json!({ "refreshToken": refresh }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["expiresIn"], 3600);
    let claims = app.state.codec.verify(body["token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.principal.id, login["user"]["id"].as_str().unwrap());
    assert_eq!(claims.principal.role, Role::Admin);
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let app = TestApp::new().await;
    let login = login_as_admin(&app).await;

    let resp = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/refresh",
            None,
            &json!({ "refreshToken": login["token"] }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), "invalid_refresh_token");
}

#[tokio::test]
async fn refresh_token_is_not_a_bearer_token() {
    let app = TestApp::new().await;
    let login = login_as_admin(&app).await;
    let refresh = login["refreshToken"].as_str().unwrap();

    let resp = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/me")
                .header("authorization", format!("Bearer {refresh}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), "auth_claims");
}

#[tokio::test]
async fn deleted_user_cannot_refresh() {
    let app = TestApp::new().await;
    let refresh = app
        .state
        .codec
        .issue_refresh(&Principal::new("deleted-user", Role::Teacher))
        .unwrap()
        .token;

    let resp = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/refresh",
            None,
            &json!({ "refreshToken": refresh }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["code"], "invalid_refresh_token");

    let resp = app
        .router
        .clone()
        .oneshot(json_request("POST", "/auth/refresh", None, &json!({})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("x-error-code").unwrap(), "missing_refresh_token");
}
