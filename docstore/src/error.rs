use thiserror::Error;

use crate::collection::Collection;

/// Result type alias for document store operations
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Errors that can occur while talking to the document store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: Collection, id: String },

    #[error("in-list filter has {len} values, the store accepts at most {max}")]
    InListTooLarge { len: usize, max: usize },

    #[error("invalid document {id}: {reason}")]
    InvalidDocument { id: String, reason: String },

    #[error("base URL cannot carry a path: {0}")]
    InvalidBaseUrl(String),

    #[error("document store returned {status} for {operation}")]
    Status { operation: &'static str, status: u16 },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
