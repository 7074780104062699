use docstore::Collection;
use session::{Role, SessionContext};
use url::Url;

use super::{Backend, Result, ScreenError, View, authorize, decode_all, non_empty, now_millis};
use crate::records::Material;

/// Links to study material shared by teachers.
pub struct MaterialShelf {
    backend: Backend,
}

impl MaterialShelf {
    pub fn new(backend: Backend) -> Self {
        MaterialShelf { backend }
    }

    pub async fn share(
        &self,
        ctx: &SessionContext,
        title: &str,
        link: &str,
    ) -> Result<View<Material>> {
        let teacher_id = authorize!(ctx, &[Role::Teacher]);
        let link = Url::parse(link.trim())
            .map_err(|e| ScreenError::Invalid(format!("invalid link {link:?}: {e}")))?;

        let mut material = Material {
            id: String::new(),
            teacher_id,
            title: non_empty(title, "title")?,
            link: link.to_string(),
            created_at: now_millis(),
        };
        material.id = self.backend.create(Collection::Materials, &material).await?;
        Ok(View::Render(material))
    }

    pub async fn for_student(&self, ctx: &SessionContext) -> Result<View<Vec<Material>>> {
        let student_id = authorize!(ctx, &[Role::Student]);
        let linked = self.backend.linked_teacher_ids(&student_id).await?;
        let docs = self
            .backend
            .fan_out_newest_first(Collection::Materials, "teacherId", &linked)
            .await?;
        Ok(View::Render(decode_all(&docs)?))
    }

    pub async fn shared_by_me(&self, ctx: &SessionContext) -> Result<View<Vec<Material>>> {
        let teacher_id = authorize!(ctx, &[Role::Teacher]);
        let docs = self
            .backend
            .list_by(Collection::Materials, "teacherId", &teacher_id)
            .await?;
        Ok(View::Render(decode_all(&docs)?))
    }
}
