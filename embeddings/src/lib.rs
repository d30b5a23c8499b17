//! # Embeddings
//!
//! This crate holds the retrieval core of ragchat: the pre-built vector
//! store, the exact cosine-similarity ranker, and the providers that turn a
//! query into a vector.
//!
//! ## Features
//!
//! - **Vector Store**: Load and validate the chunk artifact produced offline
//! - **Similarity Ranking**: Exact top-k search with deterministic ordering
//! - **Multiple Providers**: Hugging Face feature extraction, OpenAI
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► query Embedding ──► find_top_k           │
//! │       │                                        │                │
//! │       ▼                                        ▼                │
//! │  HuggingFace/OpenAI                  VectorStore (JSON file)    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod provider;
pub mod similarity;
pub mod store;

pub use error::{EmbeddingError, Result, StoreError};
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, HuggingFaceProvider, OpenAIProvider,
    Pooling,
};
pub use similarity::{ScoredChunk, cosine_similarity, find_top_k, mean_pool, normalize};
pub use store::{Chunk, VectorStore};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings produced by the default model.
pub const DEFAULT_DIMENSION: usize = 384; // all-MiniLM-L6-v2

/// Model the offline build pipeline embeds the corpus with.
pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
