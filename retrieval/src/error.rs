//! Error types for the retrieval pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ragchat_embeddings::{EmbeddingError, StoreError};
use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something unusable; retrying will not help.
    InvalidRequest,
    /// The vector store artifact is missing or malformed.
    StoreUnavailable,
    /// The embedding capability failed.
    EmbeddingFailure,
    /// The generation capability failed.
    GenerationFailure,
    /// The request deadline expired.
    Timeout,
    /// The pipeline is misconfigured.
    Config,
}

/// Errors that can occur while retrieving context or answering.
#[derive(Error, Debug, Clone)]
pub enum RetrievalError {
    /// Missing or empty input.
    #[error("{0}")]
    InvalidRequest(String),

    /// The vector store could not be loaded. This is cached for the life of
    /// the process. The message leaves out the cause, which names server
    /// paths; it is reachable through `source()`.
    #[error("Vector store not initialized. Rebuild the index to create it.")]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: Arc<StoreError>,
    },

    /// Embedding the query failed, or the query does not fit the store.
    #[error("embedding failed: {0}")]
    Embedding(#[source] Arc<EmbeddingError>),

    /// The generation model failed.
    #[error("generation failed: {0}")]
    Generation(#[source] Arc<GenerationError>),

    /// The request deadline expired.
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RetrievalError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            Self::Embedding(_) => ErrorKind::EmbeddingFailure,
            Self::Generation(_) => ErrorKind::GenerationFailure,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::EmbeddingFailure | ErrorKind::GenerationFailure | ErrorKind::Timeout
        )
    }
}

impl From<EmbeddingError> for RetrievalError {
    fn from(err: EmbeddingError) -> Self {
        Self::Embedding(Arc::new(err))
    }
}

impl From<GenerationError> for RetrievalError {
    fn from(err: GenerationError) -> Self {
        Self::Generation(Arc::new(err))
    }
}

/// Errors raised by generation providers.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Provider not configured.
    #[error("generation provider not configured: {0}")]
    NotConfigured(String),

    /// The API answered with a non-success status.
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Rate limit or quota exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// The API answered without usable content.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_store_unavailable_message_asks_for_rebuild() {
        let err = RetrievalError::StoreUnavailable {
            path: PathBuf::from("public/vector_store.json"),
            source: Arc::new(StoreError::NotFound {
                path: PathBuf::from("public/vector_store.json"),
            }),
        };

        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Vector store not initialized. Rebuild the index to create it."
        );
        assert_eq!(
            std::error::Error::source(&err).map(ToString::to_string),
            Some("vector store not found at public/vector_store.json".to_string())
        );
    }

    #[test]
    fn test_provider_errors_are_retryable() {
        let embedding: RetrievalError = EmbeddingError::RateLimited {
            retry_after_secs: 5,
        }
        .into();
        let generation: RetrievalError = GenerationError::Api {
            status: 503,
            body: "busy".to_string(),
        }
        .into();

        assert_eq!(embedding.kind(), ErrorKind::EmbeddingFailure);
        assert_eq!(generation.kind(), ErrorKind::GenerationFailure);
        assert!(embedding.is_retryable());
        assert!(generation.is_retryable());
        assert!(!RetrievalError::InvalidRequest("Message required".to_string()).is_retryable());
    }
}
