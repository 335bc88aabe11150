use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::store::{Class, ClassPatch, ClassStore, StoreResult, Subject, SubjectPatch};

#[derive(Default)]
struct Tables {
    subjects: HashMap<String, Subject>,
    classes: HashMap<String, Class>,
}

/// Store used when no `DATABASE_URL` is configured, and by tests.
#[derive(Default)]
pub struct MemoryClassStore {
    tables: RwLock<Tables>,
}

impl MemoryClassStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted<T, F: Fn(&T) -> &str>(mut items: Vec<T>, key: F) -> Vec<T> {
    items.sort_by(|a, b| key(a).cmp(key(b)));
    items
}

#[async_trait]
impl ClassStore for MemoryClassStore {
    async fn create_subject(&self, subject: Subject) -> StoreResult<Subject> {
        let mut tables = self.tables.write().await;
        tables.subjects.insert(subject.id.clone(), subject.clone());
        Ok(subject)
    }

    async fn list_subjects(&self) -> StoreResult<Vec<Subject>> {
        let tables = self.tables.read().await;
        Ok(sorted(tables.subjects.values().cloned().collect(), |s| s.name.as_str()))
    }

    async fn get_subject(&self, id: &str) -> StoreResult<Option<Subject>> {
        Ok(self.tables.read().await.subjects.get(id).cloned())
    }

    async fn update_subject(&self, id: &str, patch: SubjectPatch) -> StoreResult<Option<Subject>> {
        let mut tables = self.tables.write().await;
        let Some(subject) = tables.subjects.get_mut(id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            subject.name = name;
        }
        if let Some(teacher_ids) = patch.teacher_ids {
            subject.teacher_ids = teacher_ids;
        }
        subject.updated_at = Utc::now();
        Ok(Some(subject.clone()))
    }

    async fn delete_subject(&self, id: &str) -> StoreResult<Option<Subject>> {
        let mut tables = self.tables.write().await;
        let removed = tables.subjects.remove(id);
        if removed.is_some() {
            for class in tables.classes.values_mut() {
                class.subject_ids.retain(|s| s != id);
            }
        }
        Ok(removed)
    }

    async fn missing_subjects(&self, ids: &[String]) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter(|id| !tables.subjects.contains_key(id.as_str()))
            .cloned()
            .collect())
    }

    async fn create_class(&self, class: Class) -> StoreResult<Class> {
        let mut tables = self.tables.write().await;
        tables.classes.insert(class.id.clone(), class.clone());
        Ok(class)
    }

    async fn list_classes(&self) -> StoreResult<Vec<Class>> {
        let tables = self.tables.read().await;
        Ok(sorted(tables.classes.values().cloned().collect(), |c| c.name.as_str()))
    }

    async fn get_class(&self, id: &str) -> StoreResult<Option<Class>> {
        Ok(self.tables.read().await.classes.get(id).cloned())
    }

    async fn update_class(&self, id: &str, patch: ClassPatch) -> StoreResult<Option<Class>> {
        let mut tables = self.tables.write().await;
        let Some(class) = tables.classes.get_mut(id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            class.name = name;
        }
        if let Some(student_ids) = patch.student_ids {
            class.student_ids = student_ids;
        }
        if let Some(subject_ids) = patch.subject_ids {
            class.subject_ids = subject_ids;
        }
        class.updated_at = Utc::now();
        Ok(Some(class.clone()))
    }

    async fn delete_class(&self, id: &str) -> StoreResult<Option<Class>> {
        Ok(self.tables.write().await.classes.remove(id))
    }

    async fn add_subject_to_class(&self, class_id: &str, subject_id: &str) -> StoreResult<Option<Class>> {
        let mut tables = self.tables.write().await;
        let Some(class) = tables.classes.get_mut(class_id) else {
            return Ok(None);
        };
        if !class.subject_ids.iter().any(|s| s == subject_id) {
            class.subject_ids.push(subject_id.to_string());
            class.updated_at = Utc::now();
        }
        Ok(Some(class.clone()))
    }

    async fn add_student_to_class(&self, class_id: &str, student_id: &str) -> StoreResult<Option<Class>> {
        let mut tables = self.tables.write().await;
        let Some(class) = tables.classes.get_mut(class_id) else {
            return Ok(None);
        };
        if !class.student_ids.iter().any(|s| s == student_id) {
            class.student_ids.push(student_id.to_string());
            class.updated_at = Utc::now();
        }
        Ok(Some(class.clone()))
    }

    async fn subjects_for_student(&self, student_id: &str) -> StoreResult<Vec<Subject>> {
        let tables = self.tables.read().await;
        let mut subjects: Vec<Subject> = Vec::new();
        for class in tables.classes.values().filter(|c| c.student_ids.iter().any(|s| s == student_id)) {
            for subject_id in &class.subject_ids {
                if subjects.iter().any(|s| &s.id == subject_id) {
                    continue;
                }
                if let Some(subject) = tables.subjects.get(subject_id) {
                    subjects.push(subject.clone());
                }
            }
        }
        Ok(sorted(subjects, |s| s.name.as_str()))
    }

    async fn classes_for_student(&self, student_id: &str) -> StoreResult<Vec<Class>> {
        let tables = self.tables.read().await;
        let classes = tables
            .classes
            .values()
            .filter(|c| c.student_ids.iter().any(|s| s == student_id))
            .cloned()
            .collect();
        Ok(sorted(classes, |c| c.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(id: &str, name: &str) -> Subject {
        let now = Utc::now();
        Subject {
            id: id.into(),
            name: name.into(),
            teacher_ids: vec!["t1".into()],
            created_at: now,
            updated_at: now,
        }
    }

    fn class(id: &str, students: &[&str], subjects: &[&str]) -> Class {
        let now = Utc::now();
        Class {
            id: id.into(),
            name: id.to_uppercase(),
            student_ids: students.iter().map(|s| s.to_string()).collect(),
            subject_ids: subjects.iter().map(|s| s.to_string()).collect(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn student_subjects_are_deduplicated_across_classes() {
        let store = MemoryClassStore::new();
        store.create_subject(subject("math", "Mathematics")).await.unwrap();
        store.create_subject(subject("bio", "Biology")).await.unwrap();
        store.create_class(class("7a", &["u9"], &["math", "bio"])).await.unwrap();
        store.create_class(class("7b", &["u9"], &["math"])).await.unwrap();
        store.create_class(class("8a", &["u8"], &["bio"])).await.unwrap();

        let subjects = store.subjects_for_student("u9").await.unwrap();
        let ids: Vec<_> = subjects.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["bio", "math"]);
        assert_eq!(store.classes_for_student("u9").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn deleting_subject_unlinks_it_from_classes() {
        let store = MemoryClassStore::new();
        store.create_subject(subject("math", "Mathematics")).await.unwrap();
        store.create_class(class("7a", &["u9"], &["math"])).await.unwrap();

        assert!(store.delete_subject("math").await.unwrap().is_some());
        assert!(store.get_class("7a").await.unwrap().unwrap().subject_ids.is_empty());
        assert!(store.subjects_for_student("u9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn adding_members_is_idempotent() {
        let store = MemoryClassStore::new();
        store.create_class(class("7a", &[], &[])).await.unwrap();
        store.add_student_to_class("7a", "u9").await.unwrap();
        let class = store.add_student_to_class("7a", "u9").await.unwrap().unwrap();
        assert_eq!(class.student_ids, vec!["u9"]);
        assert!(store.add_student_to_class("missing", "u9").await.unwrap().is_none());
    }
}
