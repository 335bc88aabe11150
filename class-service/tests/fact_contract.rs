//! The class service answers the lookups `ClassServiceClient` makes.

mod support;

use std::time::Duration;

use common_auth::Role;
use common_facts::{ClassDirectory, ClassServiceClient, FactError};
use serde_json::json;
use support::TestApp;
use tokio::net::TcpListener;

async fn serve(app: &TestApp) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn directory_reads_live_class_service() {
    let app = TestApp::new();
    let admin = app.token("a1", Role::Admin);
    let (_, subject) = app
        .call("POST", "/subjects", &admin, Some(json!({ "name": "Math", "teacherIds": ["t1"] })))
        .await;
    let subject_id = subject["id"].as_str().unwrap().to_string();
    let (_, class) = app
        .call(
            "POST",
            "/classes",
            &admin,
            Some(json!({ "name": "7A", "subjectIds": [subject_id], "studentIds": ["u9"] })),
        )
        .await;
    let class_id = class["id"].as_str().unwrap().to_string();

    let base_url = serve(&app).await;
    let directory = ClassServiceClient::new(&base_url, Duration::from_secs(2)).unwrap();
    let teacher_bearer = format!("Bearer {}", app.token("t1", Role::Teacher));
    let student_bearer = format!("Bearer {}", app.token("u9", Role::Student));

    let fact = directory.subject(&subject_id, &teacher_bearer).await.unwrap();
    assert!(fact.is_taught_by("t1"));
    assert!(directory.subject_exists(&subject_id, &teacher_bearer).await.unwrap());
    assert!(!directory.subject_exists("ghost", &teacher_bearer).await.unwrap());

    let roster = directory.class_roster(&class_id, &teacher_bearer).await.unwrap();
    assert!(roster.has_student("u9"));

    let enrolled = directory.enrolled_subject_ids("u9", &student_bearer).await.unwrap();
    assert_eq!(enrolled, vec![subject_id]);

    let err = directory.class_roster(&class_id, &student_bearer).await.unwrap_err();
    assert!(matches!(err, FactError::Denied { status: 403, .. }));
}
