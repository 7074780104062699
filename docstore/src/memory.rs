//! In-process document store used by tests and the `memory` store type.

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::document::{Document, Fields, apply_partial};
use crate::error::{Result, StoreError};
use crate::{Collection, DocumentStore, check_in_list};

type Documents = IndexMap<String, Fields>;

/// A document store held in memory. Clones share the same data.
///
/// Enforces the same in-list limit as the hosted store so code tested
/// against it behaves the same in production.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<Collection, Documents>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a document with a fixed id.
    pub fn insert(&self, collection: Collection, id: impl Into<String>, fields: Fields) {
        self.collections
            .write()
            .entry(collection)
            .or_default()
            .insert(id.into(), fields);
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .get(&collection)
            .map_or(0, IndexMap::len)
    }

    pub fn is_empty(&self, collection: Collection) -> bool {
        self.len(collection) == 0
    }

    fn select<P>(&self, collection: Collection, predicate: P) -> Vec<Document>
    where
        P: Fn(&Document) -> bool,
    {
        let collections = self.collections.read();
        let Some(documents) = collections.get(&collection) else {
            return Vec::new();
        };

        documents
            .iter()
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .filter(|doc| predicate(doc))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_by_equality(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>> {
        Ok(self.select(collection, |doc| doc.matches_eq(field, value)))
    }

    async fn get_by_id_list(
        &self,
        collection: Collection,
        ids: &[String],
    ) -> Result<Vec<Document>> {
        check_in_list(ids.len())?;
        Ok(self.select(collection, |doc| ids.contains(&doc.id)))
    }

    async fn get_by_field_in(
        &self,
        collection: Collection,
        field: &str,
        values: &[String],
    ) -> Result<Vec<Document>> {
        check_in_list(values.len())?;
        Ok(self.select(collection, |doc| doc.matches_in(field, values)))
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        Ok(self
            .collections
            .read()
            .get(&collection)
            .and_then(|documents| documents.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn create(&self, collection: Collection, fields: Fields) -> Result<String> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.insert(collection, id.clone(), fields);
        tracing::debug!(%collection, %id, "Created document");
        Ok(id)
    }

    async fn update(&self, collection: Collection, id: &str, partial: Fields) -> Result<()> {
        let mut collections = self.collections.write();
        let fields = collections
            .get_mut(&collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?;

        apply_partial(fields, partial);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let removed = self
            .collections
            .write()
            .get_mut(&collection)
            .and_then(|documents| documents.shift_remove(id));

        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            }),
        }
    }
}
