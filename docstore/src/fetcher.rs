//! Adapts a document store "in list" query to the fan-out batch seam.

use async_trait::async_trait;
use fanout::BatchFetcher;
use std::sync::Arc;

use crate::document::{Document, ID_FIELD};
use crate::error::StoreError;
use crate::{Collection, DocumentStore};

/// Fetches one batch of a fan-out query from a collection.
///
/// With the key field set to `id` each batch is a `get_by_id_list`;
/// otherwise it is a `get_by_field_in` on that field. Either way the merged
/// records are keyed by document id.
pub struct CollectionFetcher {
    store: Arc<dyn DocumentStore>,
    collection: Collection,
    field: String,
}

impl CollectionFetcher {
    /// Fetches documents by their own id.
    pub fn by_id(store: Arc<dyn DocumentStore>, collection: Collection) -> Self {
        Self::by_field(store, collection, ID_FIELD)
    }

    /// Fetches documents whose `field` is one of the batch values.
    pub fn by_field(
        store: Arc<dyn DocumentStore>,
        collection: Collection,
        field: impl Into<String>,
    ) -> Self {
        CollectionFetcher {
            store,
            collection,
            field: field.into(),
        }
    }
}

#[async_trait]
impl BatchFetcher for CollectionFetcher {
    type Record = Document;
    type Error = StoreError;

    async fn fetch_batch(&self, batch: Vec<String>) -> Result<Vec<Document>, StoreError> {
        if self.field == ID_FIELD {
            self.store.get_by_id_list(self.collection, &batch).await
        } else {
            self.store
                .get_by_field_in(self.collection, &self.field, &batch)
                .await
        }
    }
}
