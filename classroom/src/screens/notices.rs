use docstore::Collection;
use session::{Role, SessionContext};

use super::{Backend, Result, ScreenError, View, authorize, decode_all, non_empty, now_millis};
use crate::records::Notice;

pub struct NoticeBoard {
    backend: Backend,
}

impl NoticeBoard {
    pub fn new(backend: Backend) -> Self {
        NoticeBoard { backend }
    }

    pub async fn post(
        &self,
        ctx: &SessionContext,
        title: &str,
        body: &str,
    ) -> Result<View<Notice>> {
        let author_id = authorize!(ctx, &[Role::Teacher, Role::Admin]);
        let mut notice = Notice {
            id: String::new(),
            author_id,
            title: non_empty(title, "title")?,
            body: body.trim().to_string(),
            created_at: now_millis(),
        };
        notice.id = self.backend.create(Collection::Notices, &notice).await?;
        Ok(View::Render(notice))
    }

    /// Deletes a notice. Teachers may only delete their own; admins any.
    pub async fn delete(&self, ctx: &SessionContext, notice_id: &str) -> Result<View<()>> {
        let user_id = authorize!(ctx, &[Role::Teacher, Role::Admin]);
        let notice: Notice = self.backend.find(Collection::Notices, notice_id).await?;
        if notice.author_id != user_id && ctx.role() != Some(Role::Admin) {
            return Err(ScreenError::Invalid(format!(
                "notice {notice_id} was posted by someone else"
            )));
        }

        self.backend
            .store()
            .delete(Collection::Notices, notice_id)
            .await?;
        tracing::info!(%notice_id, "Deleted notice");
        Ok(View::Render(()))
    }

    /// Students see notices from their linked teachers; teachers and admins
    /// see what they posted.
    pub async fn feed(&self, ctx: &SessionContext) -> Result<View<Vec<Notice>>> {
        let user_id = authorize!(ctx, &[Role::Student, Role::Teacher, Role::Admin]);
        let docs = if ctx.role() == Some(Role::Student) {
            let linked = self.backend.linked_teacher_ids(&user_id).await?;
            self.backend
                .fan_out_newest_first(Collection::Notices, "authorId", &linked)
                .await?
        } else {
            self.backend
                .list_by(Collection::Notices, "authorId", &user_id)
                .await?
        };
        Ok(View::Render(decode_all(&docs)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screens::testutils::{ctx, fields, seeded};
    use serde_json::json;
    use session::DenyReason;

    #[tokio::test]
    async fn test_student_feed_fans_out_over_linked_teachers() {
        let (backend, memory) = seeded();
        let notices = [("n1", "t1", 1), ("n2", "t2", 2), ("n3", "t3", 3), ("n4", "a1", 4)];
        for (id, author, at) in notices {
            memory.insert(
                Collection::Notices,
                id,
                fields(json!({"authorId": author, "title": id, "createdAt": at})),
            );
        }

        let feed = backend
            .notices()
            .feed(&ctx("s1", Role::Student))
            .await
            .unwrap()
            .rendered()
            .unwrap();
        let ids: Vec<_> = feed.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n2", "n1"]);

        let own = backend
            .notices()
            .feed(&ctx("a1", Role::Admin))
            .await
            .unwrap()
            .rendered()
            .unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, "n4");
    }

    #[tokio::test]
    async fn test_post_and_delete() {
        let (backend, memory) = seeded();
        let board = backend.notices();

        let notice = board
            .post(&ctx("t1", Role::Teacher), "Exam moved", "Now on Friday")
            .await
            .unwrap()
            .rendered()
            .unwrap();
        assert_eq!(memory.len(Collection::Notices), 1);

        assert_eq!(
            board.post(&ctx("s1", Role::Student), "hi", "").await.unwrap(),
            View::Redirect(DenyReason::WrongRole)
        );
        assert!(matches!(
            board.delete(&ctx("t2", Role::Teacher), &notice.id).await,
            Err(ScreenError::Invalid(_))
        ));

        // Admins may delete anyone's notice
        board.delete(&ctx("a1", Role::Admin), &notice.id).await.unwrap();
        assert!(memory.is_empty(Collection::Notices));
    }
}
