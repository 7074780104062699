//! Merging of batch results into a deduplicated record set.

use indexmap::IndexMap;
use std::cmp::Ordering;

use crate::Keyed;

/// Records from every successful batch, keyed by record id.
///
/// Iteration order follows merge order, which depends on batch completion
/// and carries no meaning. Callers that need an order use
/// [`MergedRecordSet::into_sorted_by`].
#[derive(Debug)]
pub struct MergedRecordSet<R> {
    records: IndexMap<String, R>,
}

impl<R: Keyed> MergedRecordSet<R> {
    pub fn new() -> Self {
        Self {
            records: IndexMap::new(),
        }
    }

    /// Merges the records of one batch. A record whose id is already present
    /// replaces the earlier one.
    pub fn merge(&mut self, records: Vec<R>) {
        for record in records {
            self.records.insert(record.key().to_string(), record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains_key(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&R> {
        self.records.get(id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn into_records(self) -> Vec<R> {
        self.records.into_values().collect()
    }

    /// Returns the records sorted once with `compare`.
    pub fn into_sorted_by<F>(self, compare: F) -> Vec<R>
    where
        F: FnMut(&R, &R) -> Ordering,
    {
        let mut records = self.into_records();
        records.sort_by(compare);
        records
    }
}

impl<R: Keyed> Default for MergedRecordSet<R> {
    fn default() -> Self {
        Self::new()
    }
}
