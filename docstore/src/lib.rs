//! Access to the hosted document store.
//!
//! The store is an external collaborator. This crate only defines the
//! [`DocumentStore`] seam the screens are written against, plus two
//! implementations: [`RestStore`] for the hosted backend and [`MemoryStore`]
//! for tests and local demos. Access control lives in the hosted store's own
//! rules; nothing here enforces it.

pub mod collection;
pub mod document;
pub mod error;
pub mod fetcher;
pub mod memory;
pub mod metrics_defs;
pub mod rest;

use async_trait::async_trait;
use serde_json::Value;

pub use collection::Collection;
pub use document::{Document, Fields};
pub use error::{Result, StoreError};
pub use fetcher::CollectionFetcher;
pub use memory::MemoryStore;
pub use rest::RestStore;

/// The store rejects "in list" filters with more values than this.
pub const MAX_IN_LIST: usize = fanout::MAX_BATCH;

/// Collection-scoped operations offered by the document store.
///
/// There are no transactions and no multi-document atomicity.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents whose `field` equals `value`.
    async fn get_by_equality(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>>;

    /// Documents whose id is in `ids`. At most [`MAX_IN_LIST`] ids.
    async fn get_by_id_list(&self, collection: Collection, ids: &[String]) -> Result<Vec<Document>>;

    /// Documents whose string `field` is one of `values`. At most
    /// [`MAX_IN_LIST`] values.
    async fn get_by_field_in(
        &self,
        collection: Collection,
        field: &str,
        values: &[String],
    ) -> Result<Vec<Document>>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>>;

    /// Creates a document and returns its generated id.
    async fn create(&self, collection: Collection, fields: Fields) -> Result<String>;

    /// Merges `partial` into an existing document.
    async fn update(&self, collection: Collection, id: &str, partial: Fields) -> Result<()>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;
}

pub(crate) fn check_in_list(len: usize) -> Result<()> {
    if len > MAX_IN_LIST {
        return Err(StoreError::InListTooLarge {
            len,
            max: MAX_IN_LIST,
        });
    }
    Ok(())
}
