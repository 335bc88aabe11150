#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chrono::{Duration, Utc};
use common_auth::{JwtConfig, Principal, Role, TokenCodec};
use common_facts::{ClassDirectory, ClassRoster, FactError, FactResult, SubjectFact};
use common_observability::ServiceMetrics;
use http_body_util::BodyExt;
use serde_json::Value;
use submission_service::app::SERVICE_NAME;
use submission_service::memory_store::MemorySubmissionStore;
use submission_service::store::{Assignment, Submission, SubmissionStore};
use submission_service::{router, AppState};
use tower::util::ServiceExt;

/// In-process class service with a call counter.
#[derive(Default)]
pub struct FakeDirectory {
    teachers: Mutex<HashMap<String, Vec<String>>>,
    enrollment: Mutex<HashMap<String, Vec<String>>>,
    rosters: Mutex<HashMap<String, Vec<String>>>,
    calls: AtomicUsize,
}

fn owned(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

impl FakeDirectory {
    pub fn set_teachers(&self, subject_id: &str, teachers: &[&str]) {
        self.teachers
            .lock()
            .unwrap()
            .insert(subject_id.to_string(), owned(teachers));
    }

    pub fn enroll(&self, student_id: &str, subjects: &[&str]) {
        self.enrollment
            .lock()
            .unwrap()
            .insert(student_id.to_string(), owned(subjects));
    }

    pub fn set_roster(&self, class_id: &str, students: &[&str]) {
        self.rosters
            .lock()
            .unwrap()
            .insert(class_id.to_string(), owned(students));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClassDirectory for FakeDirectory {
    async fn subject_exists(&self, subject_id: &str, _bearer: &str) -> FactResult<bool> {
        self.hit();
        Ok(self.teachers.lock().unwrap().contains_key(subject_id))
    }

    async fn subject(&self, subject_id: &str, _bearer: &str) -> FactResult<SubjectFact> {
        self.hit();
        let teachers = self.teachers.lock().unwrap();
        let teacher_ids = teachers
            .get(subject_id)
            .cloned()
            .ok_or(FactError::NotFound { target: "class-service" })?;
        Ok(SubjectFact {
            id: subject_id.to_string(),
            name: subject_id.to_uppercase(),
            teacher_ids,
        })
    }

    async fn class_roster(&self, class_id: &str, _bearer: &str) -> FactResult<ClassRoster> {
        self.hit();
        let rosters = self.rosters.lock().unwrap();
        let student_ids = rosters
            .get(class_id)
            .cloned()
            .ok_or(FactError::NotFound { target: "class-service" })?;
        Ok(ClassRoster {
            id: class_id.to_string(),
            name: class_id.to_uppercase(),
            student_ids,
            subject_ids: Vec::new(),
        })
    }

    async fn enrolled_subject_ids(&self, student_id: &str, _bearer: &str) -> FactResult<Vec<String>> {
        self.hit();
        Ok(self
            .enrollment
            .lock()
            .unwrap()
            .get(student_id)
            .cloned()
            .unwrap_or_default())
    }
}

pub struct TestApp {
    pub router: Router,
    pub codec: Arc<TokenCodec>,
    pub store: Arc<MemorySubmissionStore>,
    pub metrics: Arc<ServiceMetrics>,
}

impl TestApp {
    pub fn with_directory(directory: Arc<dyn ClassDirectory>) -> Self {
        let codec = Arc::new(TokenCodec::new(JwtConfig::new("submission-test-secret")));
        let store = Arc::new(MemorySubmissionStore::new());
        let metrics = Arc::new(ServiceMetrics::new(SERVICE_NAME).expect("metrics"));
        let state = AppState::new(store.clone(), codec.clone(), directory, metrics.clone());
        Self {
            router: router(state),
            codec,
            store,
            metrics,
        }
    }

    pub fn with_fake() -> (Self, Arc<FakeDirectory>) {
        let fake = Arc::new(FakeDirectory::default());
        (Self::with_directory(fake.clone()), fake)
    }

    pub fn token(&self, id: &str, role: Role) -> String {
        self.codec
            .issue_default(&Principal::new(id, role))
            .expect("issue")
            .token
    }

    pub async fn seed_assignment(&self, id: &str, teacher_id: &str, subject_id: &str) -> Assignment {
        let now = Utc::now();
        self.store
            .create_assignment(Assignment {
                id: id.into(),
                title: format!("Assignment {id}"),
                description: None,
                due_date: now + Duration::days(7),
                subject_id: subject_id.into(),
                teacher_id: teacher_id.into(),
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("seed assignment")
    }

    pub async fn seed_submission(&self, id: &str, assignment_id: &str, student_id: &str) -> Submission {
        let now = Utc::now();
        self.store
            .create_submission(Submission {
                id: id.into(),
                assignment_id: assignment_id.into(),
                student_id: student_id.into(),
                file_path: format!("uploads/{id}.pdf"),
                feedback_path: None,
                feedback_comment: None,
                grade: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("seed submission")
    }

    pub async fn send(&self, method: &str, uri: &str, token: &str, body: Option<Value>) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"));
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response")
    }

    pub async fn call(&self, method: &str, uri: &str, token: &str, body: Option<Value>) -> (u16, Value) {
        let resp = self.send(method, uri, token, body).await;
        let status = resp.status().as_u16();
        (status, body_json(resp).await)
    }

    pub fn denials(&self, reason: &str) -> u64 {
        self.metrics.access_denials_total.with_label_values(&[reason]).get()
    }

    pub fn remote_lookups(&self, fact: &str, outcome: &str) -> u64 {
        self.metrics
            .remote_fact_requests_total
            .with_label_values(&[fact, outcome])
            .get()
    }
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = resp.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
