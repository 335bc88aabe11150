//! Cross-service authorization.
//!
//! A request passes, in order, the role gate, the remote fact check and the
//! ownership gate. The first failing stage ends the check. Remote facts are
//! fetched on every call and any failure to fetch one denies the request.

use std::fmt;
use std::sync::Arc;

use common_auth::{AuthContext, Principal, Role};
use common_facts::{ClassDirectory, FactError, SubjectFact};
use thiserror::Error;
use tracing::{debug, warn};

use crate::policy::{join_roles, require_ownership, require_role, PolicyDenial};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Mutate,
}

/// Resource being acted on, described by the ids the calling service holds.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Subject {
        subject_id: &'a str,
    },
    Assignment {
        teacher_id: &'a str,
        subject_id: &'a str,
    },
    Submission {
        student_id: &'a str,
        teacher_id: &'a str,
        subject_id: &'a str,
    },
    Owned {
        owner_id: &'a str,
    },
}

/// Stage a check ended at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Role,
    RemoteFact,
    Ownership,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Role => "role",
            Stage::RemoteFact => "remote_fact",
            Stage::Ownership => "ownership",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    MissingRole(Vec<Role>),
    NotSubjectTeacher,
    NotEnrolled,
    StudentMutation,
    NotOwner,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::MissingRole(_) => "missing_role",
            DenyReason::NotSubjectTeacher => "not_subject_teacher",
            DenyReason::NotEnrolled => "not_enrolled",
            DenyReason::StudentMutation => "student_mutation",
            DenyReason::NotOwner => "not_owner",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::MissingRole(allowed) => write!(f, "requires role {}", join_roles(allowed)),
            DenyReason::NotSubjectTeacher => f.write_str("not a teacher of the subject"),
            DenyReason::NotEnrolled => f.write_str("not enrolled in the subject"),
            DenyReason::StudentMutation => f.write_str("students cannot modify this resource"),
            DenyReason::NotOwner => f.write_str("not the owner of the resource"),
        }
    }
}

impl From<PolicyDenial> for DenyReason {
    fn from(value: PolicyDenial) -> Self {
        match value {
            PolicyDenial::InsufficientRole { allowed, .. } => DenyReason::MissingRole(allowed),
            PolicyDenial::NotOwner => DenyReason::NotOwner,
        }
    }
}

#[derive(Debug, Error)]
pub enum AccessDenied {
    #[error("denied at {stage} stage: {reason}")]
    Denied { stage: Stage, reason: DenyReason },
    #[error("remote fact lookup failed: {0}")]
    Remote(#[from] FactError),
}

impl AccessDenied {
    fn denied(stage: Stage, reason: impl Into<DenyReason>) -> Self {
        AccessDenied::Denied {
            stage,
            reason: reason.into(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            AccessDenied::Denied { stage, .. } => *stage,
            AccessDenied::Remote(_) => Stage::RemoteFact,
        }
    }

    /// Short label for logs and metrics.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AccessDenied::Denied { reason, .. } => reason.code(),
            AccessDenied::Remote(FactError::Unavailable { .. }) => "remote_unavailable",
            AccessDenied::Remote(FactError::Denied { .. }) => "remote_denied",
            AccessDenied::Remote(FactError::NotFound { .. }) => "remote_not_found",
            AccessDenied::Remote(FactError::Misconfigured { .. }) => "remote_misconfigured",
        }
    }
}

/// Successful verdict. Carries the subject when one was fetched.
#[derive(Debug, Clone, Default)]
pub struct Grant {
    pub subject: Option<SubjectFact>,
}

#[derive(Clone)]
pub struct AuthorizationCoordinator {
    directory: Arc<dyn ClassDirectory>,
}

impl AuthorizationCoordinator {
    pub fn new(directory: Arc<dyn ClassDirectory>) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Arc<dyn ClassDirectory> {
        &self.directory
    }

    pub async fn authorize(
        &self,
        auth: &AuthContext,
        allowed: &[Role],
        target: Target<'_>,
        action: Action,
    ) -> Result<Grant, AccessDenied> {
        let principal = auth.principal();
        let outcome = self.evaluate(principal, &auth.bearer(), allowed, target, action).await;
        match &outcome {
            Ok(_) => debug!(principal_id = %principal.id, role = %principal.role, ?target, ?action, "access granted"),
            Err(err) => warn!(
                principal_id = %principal.id,
                role = %principal.role,
                ?target,
                ?action,
                stage = %err.stage(),
                reason = err.reason_code(),
                "access denied"
            ),
        }
        outcome
    }

    async fn evaluate(
        &self,
        principal: &Principal,
        bearer: &str,
        allowed: &[Role],
        target: Target<'_>,
        action: Action,
    ) -> Result<Grant, AccessDenied> {
        require_role(principal, allowed).map_err(|d| AccessDenied::denied(Stage::Role, d))?;

        if principal.is_admin() {
            return Ok(Grant::default());
        }

        match (principal.role, target) {
            (_, Target::Owned { owner_id }) => {
                owned_by(principal, owner_id)?;
                Ok(Grant::default())
            }
            (Role::Teacher, Target::Subject { subject_id }) => {
                let subject = self.taught_subject(principal, subject_id, bearer).await?;
                Ok(Grant { subject: Some(subject) })
            }
            (Role::Teacher, Target::Assignment { teacher_id, subject_id })
            | (Role::Teacher, Target::Submission { teacher_id, subject_id, .. }) => {
                let subject = self.taught_subject(principal, subject_id, bearer).await?;
                owned_by(principal, teacher_id)?;
                Ok(Grant { subject: Some(subject) })
            }
            (Role::Student, Target::Subject { subject_id })
            | (Role::Student, Target::Assignment { subject_id, .. }) => {
                if action == Action::Mutate {
                    return Err(AccessDenied::denied(Stage::RemoteFact, DenyReason::StudentMutation));
                }
                self.enrolled(principal, subject_id, bearer).await?;
                Ok(Grant::default())
            }
            (Role::Student, Target::Submission { student_id, .. }) => {
                owned_by(principal, student_id)?;
                Ok(Grant::default())
            }
            (Role::Admin, _) => Ok(Grant::default()),
        }
    }

    async fn taught_subject(
        &self,
        principal: &Principal,
        subject_id: &str,
        bearer: &str,
    ) -> Result<SubjectFact, AccessDenied> {
        let subject = self.directory.subject(subject_id, bearer).await?;
        if !subject.is_taught_by(&principal.id) {
            return Err(AccessDenied::denied(Stage::RemoteFact, DenyReason::NotSubjectTeacher));
        }
        Ok(subject)
    }

    async fn enrolled(&self, principal: &Principal, subject_id: &str, bearer: &str) -> Result<(), AccessDenied> {
        let enrolled = self.directory.enrolled_subject_ids(&principal.id, bearer).await?;
        if !enrolled.iter().any(|id| id == subject_id) {
            return Err(AccessDenied::denied(Stage::RemoteFact, DenyReason::NotEnrolled));
        }
        Ok(())
    }
}

fn owned_by(principal: &Principal, owner_id: &str) -> Result<(), AccessDenied> {
    require_ownership(principal, owner_id).map_err(|d| AccessDenied::denied(Stage::Ownership, d))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use common_auth::Claims;
    use common_facts::{ClassRoster, FactResult};

    use super::*;

    #[derive(Default)]
    struct FakeDirectory {
        teachers: Mutex<HashMap<String, Vec<String>>>,
        enrollment: Mutex<HashMap<String, Vec<String>>>,
        unavailable: bool,
        calls: AtomicUsize,
    }

    impl FakeDirectory {
        fn with_subject(self, subject_id: &str, teachers: &[&str]) -> Self {
            self.set_teachers(subject_id, teachers);
            self
        }

        fn with_enrollment(self, student_id: &str, subjects: &[&str]) -> Self {
            self.enrollment.lock().unwrap().insert(
                student_id.to_string(),
                subjects.iter().map(|s| s.to_string()).collect(),
            );
            self
        }

        fn set_teachers(&self, subject_id: &str, teachers: &[&str]) {
            self.teachers.lock().unwrap().insert(
                subject_id.to_string(),
                teachers.iter().map(|s| s.to_string()).collect(),
            );
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn check(&self) -> FactResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unavailable {
                return Err(FactError::Unavailable {
                    target: "class-service",
                    reason: "request timed out".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ClassDirectory for FakeDirectory {
        async fn subject_exists(&self, subject_id: &str, _bearer: &str) -> FactResult<bool> {
            self.check()?;
            Ok(self.teachers.lock().unwrap().contains_key(subject_id))
        }

        async fn subject(&self, subject_id: &str, _bearer: &str) -> FactResult<SubjectFact> {
            self.check()?;
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

        async fn class_roster(&self, _class_id: &str, _bearer: &str) -> FactResult<ClassRoster> {
            self.check()?;
            Err(FactError::NotFound { target: "class-service" })
        }

        async fn enrolled_subject_ids(&self, student_id: &str, _bearer: &str) -> FactResult<Vec<String>> {
            self.check()?;
            Ok(self
                .enrollment
                .lock()
                .unwrap()
                .get(student_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn ctx(id: &str, role: Role) -> AuthContext {
        AuthContext {
            claims: Claims {
                principal: Principal::new(id, role),
                expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
                issued_at: None,
            },
            token: "token".into(),
        }
    }

    fn coordinator(directory: Arc<FakeDirectory>) -> AuthorizationCoordinator {
        AuthorizationCoordinator::new(directory)
    }

    const STAFF: &[Role] = &[Role::Admin, Role::Teacher];

    #[tokio::test]
    async fn admin_short_circuits_without_remote_calls() {
        let directory = Arc::new(FakeDirectory::default());
        let coordinator = coordinator(directory.clone());
        let admin = ctx("a1", Role::Admin);

        let targets = [
            Target::Subject { subject_id: "s1" },
            Target::Assignment { teacher_id: "t1", subject_id: "s1" },
            Target::Submission { student_id: "u9", teacher_id: "t1", subject_id: "s1" },
            Target::Owned { owner_id: "someone-else" },
        ];
        for target in targets {
            for action in [Action::Read, Action::Mutate] {
                assert!(coordinator.authorize(&admin, STAFF, target, action).await.is_ok());
            }
        }
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn teacher_membership_is_rechecked_on_every_request() {
        let directory = Arc::new(FakeDirectory::default().with_subject("s1", &["t1", "t2"]));
        let coordinator = coordinator(directory.clone());
        let teacher = ctx("t1", Role::Teacher);
        let target = Target::Assignment { teacher_id: "t1", subject_id: "s1" };

        let grant = coordinator
            .authorize(&teacher, STAFF, target, Action::Mutate)
            .await
            .expect("member is allowed");
        assert_eq!(grant.subject.map(|s| s.id), Some("s1".to_string()));

        directory.set_teachers("s1", &["t2"]);
        let err = coordinator
            .authorize(&teacher, STAFF, target, Action::Mutate)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::RemoteFact);
        assert_eq!(err.reason_code(), "not_subject_teacher");
        assert_eq!(directory.calls(), 2);
    }

    #[tokio::test]
    async fn teacher_must_also_own_the_assignment() {
        let directory = Arc::new(FakeDirectory::default().with_subject("s1", &["t1", "t2"]));
        let coordinator = coordinator(directory);
        let err = coordinator
            .authorize(
                &ctx("t2", Role::Teacher),
                STAFF,
                Target::Assignment { teacher_id: "t1", subject_id: "s1" },
                Action::Mutate,
            )
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Ownership);
        assert_eq!(err.reason_code(), "not_owner");
    }

    #[tokio::test]
    async fn role_gate_runs_before_any_remote_call() {
        let directory = Arc::new(FakeDirectory::default().with_subject("s1", &["u9"]));
        let coordinator = coordinator(directory.clone());
        let err = coordinator
            .authorize(
                &ctx("u9", Role::Student),
                STAFF,
                Target::Subject { subject_id: "s1" },
                Action::Mutate,
            )
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Role);
        assert_eq!(err.reason_code(), "missing_role");
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn unavailable_directory_never_allows() {
        let directory = Arc::new(FakeDirectory {
            unavailable: true,
            ..FakeDirectory::default()
        });
        let coordinator = coordinator(directory);
        let err = coordinator
            .authorize(
                &ctx("t1", Role::Teacher),
                STAFF,
                Target::Assignment { teacher_id: "t1", subject_id: "s1" },
                Action::Mutate,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessDenied::Remote(FactError::Unavailable { .. })));
        assert_eq!(err.reason_code(), "remote_unavailable");
    }

    #[tokio::test]
    async fn missing_subject_denies_teacher() {
        let directory = Arc::new(FakeDirectory::default());
        let err = coordinator(directory)
            .authorize(
                &ctx("t1", Role::Teacher),
                STAFF,
                Target::Subject { subject_id: "nope" },
                Action::Mutate,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessDenied::Remote(FactError::NotFound { .. })));
    }

    #[tokio::test]
    async fn student_reads_need_current_enrollment() {
        let directory = Arc::new(FakeDirectory::default().with_enrollment("u9", &["s1"]));
        let coordinator = coordinator(directory);
        let student = ctx("u9", Role::Student);

        let enrolled = Target::Assignment { teacher_id: "t1", subject_id: "s1" };
        assert!(coordinator.authorize(&student, &[], enrolled, Action::Read).await.is_ok());

        let other = Target::Assignment { teacher_id: "t1", subject_id: "s2" };
        let err = coordinator.authorize(&student, &[], other, Action::Read).await.unwrap_err();
        assert_eq!(err.reason_code(), "not_enrolled");
    }

    #[tokio::test]
    async fn students_never_mutate_assignment_data() {
        let directory = Arc::new(FakeDirectory::default().with_enrollment("u9", &["s1"]));
        let coordinator = coordinator(directory.clone());
        let err = coordinator
            .authorize(
                &ctx("u9", Role::Student),
                &[],
                Target::Subject { subject_id: "s1" },
                Action::Mutate,
            )
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "student_mutation");
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn student_sees_only_own_submission() {
        let directory = Arc::new(FakeDirectory::default());
        let coordinator = coordinator(directory.clone());
        let student = ctx("u9", Role::Student);

        let own = Target::Submission { student_id: "u9", teacher_id: "t1", subject_id: "s1" };
        assert!(coordinator.authorize(&student, &[], own, Action::Read).await.is_ok());

        let foreign = Target::Submission { student_id: "u8", teacher_id: "t1", subject_id: "s1" };
        let err = coordinator.authorize(&student, &[], foreign, Action::Read).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Ownership);
        assert_eq!(directory.calls(), 0);
    }

    #[tokio::test]
    async fn teacher_grades_only_submissions_of_own_assignments() {
        let directory = Arc::new(FakeDirectory::default().with_subject("s1", &["t1", "t2"]));
        let coordinator = coordinator(directory);
        let target = Target::Submission { student_id: "u9", teacher_id: "t1", subject_id: "s1" };

        assert!(coordinator
            .authorize(&ctx("t1", Role::Teacher), STAFF, target, Action::Mutate)
            .await
            .is_ok());
        let err = coordinator
            .authorize(&ctx("t2", Role::Teacher), STAFF, target, Action::Mutate)
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "not_owner");
    }
}
