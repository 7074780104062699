use docstore::Collection;
use session::{Role, SessionContext};

use super::{Backend, Result, ScreenError, View, authorize, decode_all, ensure_linked, now_millis};
use crate::records::{Feedback, FeedbackSummary};

const RATINGS: std::ops::RangeInclusive<u8> = 1..=5;

pub struct FeedbackBoard {
    backend: Backend,
}

impl FeedbackBoard {
    pub fn new(backend: Backend) -> Self {
        FeedbackBoard { backend }
    }

    pub async fn leave(
        &self,
        ctx: &SessionContext,
        teacher_id: &str,
        rating: u8,
        comment: &str,
    ) -> Result<View<Feedback>> {
        let student_id = authorize!(ctx, &[Role::Student]);
        if !RATINGS.contains(&rating) {
            return Err(ScreenError::Invalid(format!(
                "rating must be between {} and {}, got {rating}",
                RATINGS.start(),
                RATINGS.end()
            )));
        }
        let linked = self.backend.linked_teacher_ids(&student_id).await?;
        ensure_linked(&linked, teacher_id)?;

        let mut feedback = Feedback {
            id: String::new(),
            student_id,
            teacher_id: teacher_id.to_string(),
            rating,
            comment: comment.trim().to_string(),
            created_at: now_millis(),
        };
        feedback.id = self.backend.create(Collection::Feedback, &feedback).await?;
        Ok(View::Render(feedback))
    }

    pub async fn for_teacher(&self, ctx: &SessionContext) -> Result<View<FeedbackSummary>> {
        let teacher_id = authorize!(ctx, &[Role::Teacher]);
        let docs = self
            .backend
            .list_by(Collection::Feedback, "teacherId", &teacher_id)
            .await?;
        let entries: Vec<Feedback> = decode_all(&docs)?;

        let average_rating = (!entries.is_empty()).then(|| {
            let total: u32 = entries.iter().map(|f| u32::from(f.rating)).sum();
            f64::from(total) / entries.len() as f64
        });
        Ok(View::Render(FeedbackSummary {
            entries,
            average_rating,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screens::testutils::{ctx, seeded};

    #[tokio::test]
    async fn test_leave_and_summarize() {
        let (backend, _) = seeded();
        let board = backend.feedback();
        let student = ctx("s1", Role::Student);

        board.leave(&student, "t1", 5, "great").await.unwrap();
        board.leave(&student, "t1", 4, "").await.unwrap();
        board.leave(&student, "t2", 1, "").await.unwrap();

        let summary = board
            .for_teacher(&ctx("t1", Role::Teacher))
            .await
            .unwrap()
            .rendered()
            .unwrap();
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.average_rating, Some(4.5));

        let empty = board
            .for_teacher(&ctx("t3", Role::Teacher))
            .await
            .unwrap()
            .rendered()
            .unwrap();
        assert_eq!(empty.average_rating, None);
    }

    #[tokio::test]
    async fn test_leave_validation() {
        let (backend, memory) = seeded();
        let board = backend.feedback();
        let student = ctx("s1", Role::Student);

        for rating in [0, 6] {
            assert!(matches!(
                board.leave(&student, "t1", rating, "").await,
                Err(ScreenError::Invalid(_))
            ));
        }
        assert!(matches!(
            board.leave(&student, "t3", 3, "").await,
            Err(ScreenError::Invalid(_))
        ));
        assert!(memory.is_empty(Collection::Feedback));
    }
}
