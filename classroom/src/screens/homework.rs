use docstore::{Collection, Fields};
use serde_json::Value;
use session::{Role, SessionContext};
use std::collections::BTreeMap;

use super::{Backend, Result, ScreenError, View, authorize, decode_all, non_empty, now_millis};
use crate::records::{Homework, Student};

pub struct HomeworkBoard {
    backend: Backend,
}

impl HomeworkBoard {
    pub fn new(backend: Backend) -> Self {
        HomeworkBoard { backend }
    }

    pub async fn assign(
        &self,
        ctx: &SessionContext,
        title: &str,
        description: &str,
        due_date: Option<&str>,
    ) -> Result<View<Homework>> {
        let teacher_id = authorize!(ctx, &[Role::Teacher]);
        let mut homework = Homework {
            id: String::new(),
            teacher_id,
            title: non_empty(title, "title")?,
            description: description.trim().to_string(),
            due_date: due_date.map(str::to_string),
            created_at: now_millis(),
            grades: BTreeMap::new(),
        };
        homework.id = self.backend.create(Collection::Homework, &homework).await?;
        Ok(View::Render(homework))
    }

    /// Homework set by any of the student's linked teachers.
    pub async fn for_student(&self, ctx: &SessionContext) -> Result<View<Vec<Homework>>> {
        let student_id = authorize!(ctx, &[Role::Student]);
        let linked = self.backend.linked_teacher_ids(&student_id).await?;
        let docs = self
            .backend
            .fan_out_newest_first(Collection::Homework, "teacherId", &linked)
            .await?;
        Ok(View::Render(decode_all(&docs)?))
    }

    pub async fn assigned_by_me(&self, ctx: &SessionContext) -> Result<View<Vec<Homework>>> {
        let teacher_id = authorize!(ctx, &[Role::Teacher]);
        let docs = self
            .backend
            .list_by(Collection::Homework, "teacherId", &teacher_id)
            .await?;
        Ok(View::Render(decode_all(&docs)?))
    }

    /// Records a student's grade on the teacher's own homework.
    pub async fn grade(
        &self,
        ctx: &SessionContext,
        homework_id: &str,
        student_id: &str,
        grade: &str,
    ) -> Result<View<Homework>> {
        let teacher_id = authorize!(ctx, &[Role::Teacher]);
        let grade = non_empty(grade, "grade")?;
        let mut homework: Homework = self.backend.find(Collection::Homework, homework_id).await?;
        if homework.teacher_id != teacher_id {
            return Err(ScreenError::Invalid(format!(
                "homework {homework_id} was assigned by another teacher"
            )));
        }
        let _: Student = self.backend.student(student_id).await?;

        let mut partial = Fields::new();
        partial.insert(format!("grades.{student_id}"), Value::from(grade.clone()));
        self.backend
            .update(Collection::Homework, homework_id, partial)
            .await?;

        homework.grades.insert(student_id.to_string(), grade);
        Ok(View::Render(homework))
    }
}
