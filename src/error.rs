//! Error types for the knowledge base.
//!
//! Provider failures are kept apart from the rest so callers can choose
//! between degrading (ingestion) and propagating (queries).

use thiserror::Error;

/// Failure at the embedding provider boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("embedding provider returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("embedding quota exceeded: {0}")]
    Quota(String),

    #[error("malformed embedding response: {0}")]
    Malformed(String),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum KbError {
    #[error(transparent)]
    EmbeddingProvider(#[from] ProviderError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store is not ready for search: {pending} items have no embedding")]
    StoreNotReady { pending: usize },

    /// Stored vectors and the current embedding model disagree on length.
    #[error("embedding dimension mismatch: expected {expected}, item {position} has {actual} (rebuild the knowledge base with the current model)")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        position: usize,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KbError {
    fn from(err: serde_json::Error) -> Self {
        KbError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KbError>;
