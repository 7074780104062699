use thiserror::Error;

/// Result type alias for fan-out operations
pub type Result<T, E = FanOutError> = std::result::Result<T, E>;

/// A single batch query that did not produce records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("batch {index} ({} ids) failed: {reason}", batch.len())]
pub struct BatchFetchError {
    /// Position of the batch in split order
    pub index: usize,
    /// The identifiers that were sent in the failed batch
    pub batch: Vec<String>,
    pub reason: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FanOutError {
    #[error("fan-out query failed: {0}")]
    BatchFetch(#[from] BatchFetchError),
}

impl FanOutError {
    /// The identifiers of the batch that failed the call.
    pub fn failed_batch(&self) -> &[String] {
        match self {
            FanOutError::BatchFetch(err) => &err.batch,
        }
    }
}
