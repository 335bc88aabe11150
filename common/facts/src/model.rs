use serde::{Deserialize, Serialize};

/// Subject as reported by the class service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectFact {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub teacher_ids: Vec<String>,
}

impl SubjectFact {
    pub fn is_taught_by(&self, user_id: &str) -> bool {
        self.teacher_ids.iter().any(|id| id == user_id)
    }
}

/// Class membership as reported by the class service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRoster {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub student_ids: Vec<String>,
    #[serde(default)]
    pub subject_ids: Vec<String>,
}

impl ClassRoster {
    pub fn has_student(&self, user_id: &str) -> bool {
        self.student_ids.iter().any(|id| id == user_id)
    }
}

/// Label for each kind of remote lookup, used in logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactKind {
    SubjectExists,
    SubjectTeachers,
    ClassRoster,
    StudentEnrollment,
}

impl FactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactKind::SubjectExists => "subject_exists",
            FactKind::SubjectTeachers => "subject_teachers",
            FactKind::ClassRoster => "class_roster",
            FactKind::StudentEnrollment => "student_enrollment",
        }
    }
}
