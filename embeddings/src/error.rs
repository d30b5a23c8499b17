//! Error types for the embeddings system.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors raised while producing or comparing embeddings.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured.
    #[error("embedding provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Top-k must select at least one chunk.
    #[error("top-k must be at least 1")]
    ZeroTopK,

    /// Nothing to pool.
    #[error("cannot pool an empty set of token vectors")]
    EmptyInput,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors raised while loading the persisted vector store.
///
/// Every variant means the same thing to callers: the index has not been
/// built (or was built wrong) and must be rebuilt by an operator.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The artifact does not exist.
    #[error("vector store not found at {}", .path.display())]
    NotFound { path: PathBuf },

    /// The artifact exists but could not be read.
    #[error("failed to read vector store at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact is not valid JSON, or a field has the wrong type.
    #[error("vector store is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The artifact parsed but does not have the expected shape.
    #[error("vector store is malformed: {0}")]
    Malformed(String),
}
