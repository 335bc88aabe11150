use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::store::{Class, ClassPatch, ClassStore, StoreResult, Subject, SubjectPatch};

#[derive(FromRow)]
struct SubjectRow {
    id: String,
    name: String,
    teacher_ids: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SubjectRow> for Subject {
    fn from(row: SubjectRow) -> Self {
        Subject {
            id: row.id,
            name: row.name,
            teacher_ids: row.teacher_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ClassRow {
    id: String,
    name: String,
    student_ids: Vec<String>,
    subject_ids: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ClassRow> for Class {
    fn from(row: ClassRow) -> Self {
        Class {
            id: row.id,
            name: row.name,
            student_ids: row.student_ids,
            subject_ids: row.subject_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SUBJECT_COLUMNS: &str = "s.id, s.name, s.teacher_ids, s.created_at, s.updated_at";

const CLASS_SELECT: &str = "SELECT c.id, c.name, c.student_ids, \
     ARRAY(SELECT cs.subject_id FROM class_subjects cs WHERE cs.class_id = c.id ORDER BY cs.subject_id) AS subject_ids, \
     c.created_at, c.updated_at FROM classes c";

pub struct PgClassStore {
    pool: PgPool,
}

impl PgClassStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_class(&self, id: &str) -> StoreResult<Option<Class>> {
        let row = sqlx::query_as::<_, ClassRow>(&format!("{CLASS_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Class::from))
    }
}

#[async_trait]
impl ClassStore for PgClassStore {
    async fn create_subject(&self, subject: Subject) -> StoreResult<Subject> {
        sqlx::query(
            "INSERT INTO subjects (id, name, teacher_ids, created_at, updated_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&subject.id)
        .bind(&subject.name)
        .bind(&subject.teacher_ids)
        .bind(subject.created_at)
        .bind(subject.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(subject)
    }

    async fn list_subjects(&self) -> StoreResult<Vec<Subject>> {
        let rows = sqlx::query_as::<_, SubjectRow>(&format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects s ORDER BY s.name"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Subject::from).collect())
    }

    async fn get_subject(&self, id: &str) -> StoreResult<Option<Subject>> {
        let row = sqlx::query_as::<_, SubjectRow>(&format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects s WHERE s.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Subject::from))
    }

    async fn update_subject(&self, id: &str, patch: SubjectPatch) -> StoreResult<Option<Subject>> {
        let row = sqlx::query_as::<_, SubjectRow>(
            "UPDATE subjects s SET name = COALESCE($2, s.name), teacher_ids = COALESCE($3, s.teacher_ids), updated_at = NOW()
             WHERE s.id = $1
             RETURNING s.id, s.name, s.teacher_ids, s.created_at, s.updated_at",
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.teacher_ids)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Subject::from))
    }

    async fn delete_subject(&self, id: &str) -> StoreResult<Option<Subject>> {
        let row = sqlx::query_as::<_, SubjectRow>(
            "DELETE FROM subjects s WHERE s.id = $1 RETURNING s.id, s.name, s.teacher_ids, s.created_at, s.updated_at",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Subject::from))
    }

    async fn missing_subjects(&self, ids: &[String]) -> StoreResult<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let missing = sqlx::query_scalar::<_, String>(
            "SELECT wanted FROM UNNEST($1::TEXT[]) AS wanted WHERE NOT EXISTS (SELECT 1 FROM subjects WHERE id = wanted)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(missing)
    }

    async fn create_class(&self, class: Class) -> StoreResult<Class> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO classes (id, name, student_ids, created_at, updated_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&class.id)
        .bind(&class.name)
        .bind(&class.student_ids)
        .bind(class.created_at)
        .bind(class.updated_at)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO class_subjects (class_id, subject_id) SELECT $1, UNNEST($2::TEXT[]) ON CONFLICT DO NOTHING",
        )
        .bind(&class.id)
        .bind(&class.subject_ids)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(class)
    }

    async fn list_classes(&self) -> StoreResult<Vec<Class>> {
        let rows = sqlx::query_as::<_, ClassRow>(&format!("{CLASS_SELECT} ORDER BY c.name"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Class::from).collect())
    }

    async fn get_class(&self, id: &str) -> StoreResult<Option<Class>> {
        self.fetch_class(id).await
    }

    async fn update_class(&self, id: &str, patch: ClassPatch) -> StoreResult<Option<Class>> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE classes SET name = COALESCE($2, name), student_ids = COALESCE($3, student_ids), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.student_ids)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        if let Some(subject_ids) = patch.subject_ids {
            sqlx::query("DELETE FROM class_subjects WHERE class_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO class_subjects (class_id, subject_id) SELECT $1, UNNEST($2::TEXT[]) ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(&subject_ids)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        self.fetch_class(id).await
    }

    async fn delete_class(&self, id: &str) -> StoreResult<Option<Class>> {
        let Some(class) = self.fetch_class(id).await? else {
            return Ok(None);
        };
        let deleted = sqlx::query("DELETE FROM classes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok((deleted.rows_affected() > 0).then_some(class))
    }

    async fn add_subject_to_class(&self, class_id: &str, subject_id: &str) -> StoreResult<Option<Class>> {
        let inserted = sqlx::query(
            "INSERT INTO class_subjects (class_id, subject_id)
             SELECT c.id, $2 FROM classes c WHERE c.id = $1
             ON CONFLICT DO NOTHING",
        )
        .bind(class_id)
        .bind(subject_id)
        .execute(&self.pool)
        .await?;
        if inserted.rows_affected() > 0 {
            sqlx::query("UPDATE classes SET updated_at = NOW() WHERE id = $1")
                .bind(class_id)
                .execute(&self.pool)
                .await?;
        }
        self.fetch_class(class_id).await
    }

    async fn add_student_to_class(&self, class_id: &str, student_id: &str) -> StoreResult<Option<Class>> {
        sqlx::query(
            "UPDATE classes SET student_ids = array_append(student_ids, $2), updated_at = NOW()
             WHERE id = $1 AND NOT ($2 = ANY(student_ids))",
        )
        .bind(class_id)
        .bind(student_id)
        .execute(&self.pool)
        .await?;
        self.fetch_class(class_id).await
    }

    async fn subjects_for_student(&self, student_id: &str) -> StoreResult<Vec<Subject>> {
        let rows = sqlx::query_as::<_, SubjectRow>(&format!(
            "SELECT {SUBJECT_COLUMNS} FROM subjects s
             WHERE EXISTS (
                 SELECT 1 FROM class_subjects cs JOIN classes c ON c.id = cs.class_id
                 WHERE cs.subject_id = s.id AND $1 = ANY(c.student_ids)
             )
             ORDER BY s.name"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Subject::from).collect())
    }

    async fn classes_for_student(&self, student_id: &str) -> StoreResult<Vec<Class>> {
        let rows = sqlx::query_as::<_, ClassRow>(&format!(
            "{CLASS_SELECT} WHERE $1 = ANY(c.student_ids) ORDER BY c.name"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Class::from).collect())
    }
}
