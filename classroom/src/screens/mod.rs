//! Screen controllers.
//!
//! Every controller runs the role gate on the [`session::SessionContext`] it is given
//! before touching the store. A deny is returned as [`View::Redirect`], never
//! as an error.

pub mod directory;
pub mod feedback;
pub mod homework;
pub mod materials;
pub mod notices;
pub mod questions;

use docstore::document::encode;
use docstore::{Collection, CollectionFetcher, Document, DocumentStore, Fields, StoreError};
use fanout::{FanOutError, FanOutMerger};
use serde::Serialize;
use serde::de::DeserializeOwned;
use session::DenyReason;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::records::Student;

pub use directory::Directory;
pub use feedback::FeedbackBoard;
pub use homework::HomeworkBoard;
pub use materials::MaterialShelf;
pub use notices::NoticeBoard;
pub use questions::QuestionBoard;

/// Runs the role gate and yields the signed-in user id, or returns a
/// redirect from the enclosing controller.
macro_rules! authorize {
    ($ctx:expr, $roles:expr) => {
        match $ctx.authorize($roles) {
            Ok(user_id) => user_id.to_string(),
            Err(reason) => return Ok($crate::screens::View::Redirect(reason)),
        }
    };
}
pub(crate) use authorize;

#[derive(Clone, Debug, PartialEq)]
pub enum View<T> {
    Render(T),
    Redirect(DenyReason),
}

impl<T> View<T> {
    pub fn rendered(self) -> Option<T> {
        match self {
            View::Render(data) => Some(data),
            View::Redirect(_) => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    FanOut(#[from] FanOutError),

    #[error("{0}")]
    Invalid(String),

    #[error("{collection}/{id} not found")]
    NotFound { collection: Collection, id: String },
}

pub type Result<T, E = ScreenError> = std::result::Result<T, E>;

/// The store and the shared fan-out merger, injected into every screen.
#[derive(Clone)]
pub struct Backend {
    store: Arc<dyn DocumentStore>,
    merger: FanOutMerger,
}

impl Backend {
    pub fn new(store: Arc<dyn DocumentStore>, merger: FanOutMerger) -> Self {
        Backend { store, merger }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn directory(&self) -> Directory {
        Directory::new(self.clone())
    }

    pub fn questions(&self) -> QuestionBoard {
        QuestionBoard::new(self.clone())
    }

    pub fn notices(&self) -> NoticeBoard {
        NoticeBoard::new(self.clone())
    }

    pub fn homework(&self) -> HomeworkBoard {
        HomeworkBoard::new(self.clone())
    }

    pub fn materials(&self) -> MaterialShelf {
        MaterialShelf::new(self.clone())
    }

    pub fn feedback(&self) -> FeedbackBoard {
        FeedbackBoard::new(self.clone())
    }

    pub(crate) async fn find<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<T> {
        match self.store.get(collection, id).await? {
            Some(doc) => Ok(doc.decode()?),
            None => Err(ScreenError::NotFound {
                collection,
                id: id.to_string(),
            }),
        }
    }

    pub(crate) async fn student(&self, student_id: &str) -> Result<Student> {
        self.find(Collection::Students, student_id).await
    }

    /// The student's linked teachers as stored, duplicates included.
    pub(crate) async fn linked_teacher_ids(&self, student_id: &str) -> Result<Vec<String>> {
        Ok(self.student(student_id).await?.preferred_teachers)
    }

    /// Documents whose `field` equals `value`, newest first.
    pub(crate) async fn list_by(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>> {
        let mut docs = self
            .store
            .get_by_equality(collection, field, &serde_json::Value::from(value))
            .await?;
        docs.sort_by(newest_first);
        Ok(docs)
    }

    /// Fan-out over `ids` on `field`, sorted once after the merge.
    pub(crate) async fn fan_out_newest_first(
        &self,
        collection: Collection,
        field: &str,
        ids: &[String],
    ) -> Result<Vec<Document>> {
        let fetcher = Arc::new(CollectionFetcher::by_field(
            self.store.clone(),
            collection,
            field,
        ));
        let merged = self.merger.fetch_all(ids, fetcher).await?;
        tracing::debug!(
            %collection,
            field,
            ids = ids.len(),
            records = merged.len(),
            "Fan-out merged"
        );
        Ok(merged.into_sorted_by(newest_first))
    }

    /// Fan-out by document id.
    pub(crate) async fn fan_out_by_id(
        &self,
        collection: Collection,
        ids: &[String],
    ) -> Result<Vec<Document>> {
        let fetcher = Arc::new(CollectionFetcher::by_id(self.store.clone(), collection));
        Ok(self.merger.fetch_all(ids, fetcher).await?.into_records())
    }

    pub(crate) async fn create<T: Serialize>(
        &self,
        collection: Collection,
        record: &T,
    ) -> Result<String> {
        let id = self.store.create(collection, to_fields(record)?).await?;
        tracing::info!(%collection, %id, "Created");
        Ok(id)
    }

    pub(crate) async fn update(
        &self,
        collection: Collection,
        id: &str,
        partial: Fields,
    ) -> Result<()> {
        self.store.update(collection, id, partial).await?;
        tracing::info!(%collection, %id, "Updated");
        Ok(())
    }
}

fn to_fields<T: Serialize>(record: &T) -> Result<Fields> {
    let mut fields = encode(record)?;
    // The store owns ids
    fields.remove(docstore::document::ID_FIELD);
    Ok(fields)
}

pub(crate) fn decode_all<T: DeserializeOwned>(docs: &[Document]) -> Result<Vec<T>> {
    docs.iter()
        .map(|doc| doc.decode().map_err(ScreenError::from))
        .collect()
}

fn created_at(doc: &Document) -> i64 {
    doc.field("createdAt")
        .and_then(serde_json::Value::as_i64)
        .unwrap_or_default()
}

/// Newest first. Equal timestamps fall back to id order so listings are stable.
fn newest_first(a: &Document, b: &Document) -> Ordering {
    created_at(b)
        .cmp(&created_at(a))
        .then_with(|| a.id.cmp(&b.id))
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

pub(crate) fn non_empty(value: &str, what: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ScreenError::Invalid(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn ensure_linked(linked: &[String], teacher_id: &str) -> Result<()> {
    if !linked.iter().any(|id| id == teacher_id) {
        return Err(ScreenError::Invalid(format!(
            "teacher {teacher_id} is not one of your teachers"
        )));
    }
    Ok(())
}
