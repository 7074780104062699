//! Splits a foreign-key set into bounded query batches.
//!
//! Duplicates are not removed here. They are resolved when the batch results
//! are merged, so splitting stays a pure chunking of the input.

use std::num::NonZeroUsize;

/// One bounded sub-request of a fan-out query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryBatch {
    /// Position in split order, used to report outcomes deterministically
    pub index: usize,
    pub ids: Vec<String>,
}

/// Splits `ids` into contiguous batches of at most `max_batch` identifiers,
/// preserving input order.
pub fn split_batches(ids: &[String], max_batch: NonZeroUsize) -> Vec<QueryBatch> {
    ids.chunks(max_batch.get())
        .enumerate()
        .map(|(index, chunk)| QueryBatch {
            index,
            ids: chunk.to_vec(),
        })
        .collect()
}
