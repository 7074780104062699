use docstore::{Collection, Fields};
use serde_json::Value;
use session::{Role, SessionContext};

use super::{
    Backend, Result, ScreenError, View, authorize, decode_all, ensure_linked, non_empty, now_millis,
};
use crate::records::{Question, QuestionStatus};

/// Questions students send to their linked teachers.
pub struct QuestionBoard {
    backend: Backend,
}

impl QuestionBoard {
    pub fn new(backend: Backend) -> Self {
        QuestionBoard { backend }
    }

    pub async fn ask(
        &self,
        ctx: &SessionContext,
        teacher_id: &str,
        text: &str,
    ) -> Result<View<Question>> {
        let student_id = authorize!(ctx, &[Role::Student]);
        let text = non_empty(text, "question")?;
        let linked = self.backend.linked_teacher_ids(&student_id).await?;
        ensure_linked(&linked, teacher_id)?;

        let mut question = Question {
            id: String::new(),
            student_id,
            teacher_id: teacher_id.to_string(),
            question: text,
            answer: None,
            status: QuestionStatus::Open,
            created_at: now_millis(),
            answered_at: None,
        };
        question.id = self.backend.create(Collection::Questions, &question).await?;
        Ok(View::Render(question))
    }

    pub async fn my_questions(&self, ctx: &SessionContext) -> Result<View<Vec<Question>>> {
        let student_id = authorize!(ctx, &[Role::Student]);
        let docs = self
            .backend
            .list_by(Collection::Questions, "studentId", &student_id)
            .await?;
        Ok(View::Render(decode_all(&docs)?))
    }

    /// Questions addressed to the signed-in teacher.
    pub async fn teacher_questions(
        &self,
        ctx: &SessionContext,
        open_only: bool,
    ) -> Result<View<Vec<Question>>> {
        let teacher_id = authorize!(ctx, &[Role::Teacher]);
        let docs = self
            .backend
            .list_by(Collection::Questions, "teacherId", &teacher_id)
            .await?;

        let mut questions: Vec<Question> = decode_all(&docs)?;
        if open_only {
            questions.retain(|q| q.status == QuestionStatus::Open);
        }
        Ok(View::Render(questions))
    }

    /// Every question addressed to any of the student's linked teachers.
    pub async fn linked_teacher_questions(
        &self,
        ctx: &SessionContext,
    ) -> Result<View<Vec<Question>>> {
        let student_id = authorize!(ctx, &[Role::Student]);
        let linked = self.backend.linked_teacher_ids(&student_id).await?;
        let docs = self
            .backend
            .fan_out_newest_first(Collection::Questions, "teacherId", &linked)
            .await?;
        Ok(View::Render(decode_all(&docs)?))
    }

    pub async fn answer(
        &self,
        ctx: &SessionContext,
        question_id: &str,
        text: &str,
    ) -> Result<View<Question>> {
        let teacher_id = authorize!(ctx, &[Role::Teacher]);
        let text = non_empty(text, "answer")?;
        let mut question: Question = self.backend.find(Collection::Questions, question_id).await?;
        if question.teacher_id != teacher_id {
            return Err(ScreenError::Invalid(format!(
                "question {question_id} is addressed to another teacher"
            )));
        }

        let answered_at = now_millis();
        let mut partial = Fields::new();
        partial.insert("answer".to_string(), Value::from(text.clone()));
        partial.insert("status".to_string(), Value::from("answered"));
        partial.insert("answeredAt".to_string(), Value::from(answered_at));
        self.backend
            .update(Collection::Questions, question_id, partial)
            .await?;

        question.answer = Some(text);
        question.status = QuestionStatus::Answered;
        question.answered_at = Some(answered_at);
        Ok(View::Render(question))
    }
}
