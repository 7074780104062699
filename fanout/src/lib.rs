//! Chunked multi-id fan-out queries.
//!
//! Backends that only accept a bounded "value in list" filter cannot answer
//! "fetch every record whose id is in S" for a large S in one request. The
//! [`FanOutMerger`] splits S into contiguous batches of at most `max_batch`
//! ids, dispatches every batch concurrently through a caller-supplied
//! [`BatchFetcher`], and merges the results into a [`MergedRecordSet`] keyed
//! by record id.

pub mod errors;
pub mod executor;
pub mod merger;
pub mod metrics_defs;
pub mod splitter;

use async_trait::async_trait;

pub use errors::{BatchFetchError, FanOutError};
pub use executor::{BatchOutcome, BestEffort, FanOutMerger};
pub use merger::MergedRecordSet;
pub use splitter::QueryBatch;

/// Largest "in list" filter the hosted document store accepts.
pub const MAX_BATCH: usize = 10;

/// A record that can be merged by its identifier.
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Executes one bounded batch query against the backend.
///
/// Implementations wrap a single store call. They are invoked concurrently
/// from spawned tasks, so they must be `Send + Sync` and hold no per-call
/// state.
#[async_trait]
pub trait BatchFetcher: Send + Sync {
    type Record: Keyed + Send + 'static;
    type Error: std::fmt::Display + Send + 'static;

    /// Fetches the records matching `batch`. `batch.len()` never exceeds the
    /// merger's configured `max_batch`.
    async fn fetch_batch(&self, batch: Vec<String>) -> Result<Vec<Self::Record>, Self::Error>;
}
