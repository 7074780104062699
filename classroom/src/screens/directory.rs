use docstore::{Collection, Fields};
use serde_json::Value;
use session::{Role, SessionContext};

use super::{Backend, Result, View, authorize, decode_all};
use crate::records::Teacher;

const ANY_ROLE: &[Role] = &[Role::Student, Role::Teacher, Role::Admin];

/// Teacher listings and the student's linked-teacher list.
pub struct Directory {
    backend: Backend,
}

impl Directory {
    pub fn new(backend: Backend) -> Self {
        Directory { backend }
    }

    /// The signed-in student's linked teachers, sorted by name.
    ///
    /// Duplicate entries in `preferredTeachers` collapse to one teacher.
    /// Linked ids with no teacher document are skipped.
    pub async fn linked_teachers(&self, ctx: &SessionContext) -> Result<View<Vec<Teacher>>> {
        let student_id = authorize!(ctx, &[Role::Student]);
        let ids = self.backend.linked_teacher_ids(&student_id).await?;

        let docs = self.backend.fan_out_by_id(Collection::Teachers, &ids).await?;
        let mut teachers: Vec<Teacher> = decode_all(&docs)?;
        teachers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(View::Render(teachers))
    }

    pub async fn teachers_by_subject(
        &self,
        ctx: &SessionContext,
        subject: &str,
    ) -> Result<View<Vec<Teacher>>> {
        authorize!(ctx, ANY_ROLE);
        let docs = self
            .backend
            .store()
            .get_by_equality(Collection::Teachers, "subject", &Value::from(subject))
            .await?;

        let mut teachers: Vec<Teacher> = decode_all(&docs)?;
        teachers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(View::Render(teachers))
    }

    /// Links a teacher to the signed-in student. Returns the updated list.
    pub async fn choose_teacher(
        &self,
        ctx: &SessionContext,
        teacher_id: &str,
    ) -> Result<View<Vec<String>>> {
        let student_id = authorize!(ctx, &[Role::Student]);
        // The teacher must exist
        let _: Teacher = self.backend.find(Collection::Teachers, teacher_id).await?;

        let mut linked = self.backend.linked_teacher_ids(&student_id).await?;
        if linked.iter().any(|id| id == teacher_id) {
            return Ok(View::Render(linked));
        }

        linked.push(teacher_id.to_string());
        self.store_linked(&student_id, &linked).await?;
        Ok(View::Render(linked))
    }

    /// Unlinks a teacher, dropping every duplicate entry of it.
    pub async fn remove_teacher(
        &self,
        ctx: &SessionContext,
        teacher_id: &str,
    ) -> Result<View<Vec<String>>> {
        let student_id = authorize!(ctx, &[Role::Student]);
        let mut linked = self.backend.linked_teacher_ids(&student_id).await?;
        let before = linked.len();
        linked.retain(|id| id != teacher_id);

        if linked.len() != before {
            self.store_linked(&student_id, &linked).await?;
        }
        Ok(View::Render(linked))
    }

    async fn store_linked(&self, student_id: &str, linked: &[String]) -> Result<()> {
        let mut partial = Fields::new();
        partial.insert("preferredTeachers".to_string(), Value::from(linked.to_vec()));
        self.backend
            .update(Collection::Students, student_id, partial)
            .await
    }
}
