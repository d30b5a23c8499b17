//! # Retrieval
//!
//! Retrieval-augmented answering over a prebuilt vector store.
//!
//! ```text
//!   question ──► RetrievalEngine ──► context ──► AnswerService ──► reply
//!                  │        │                        │
//!            StoreLoader  EmbeddingProvider    GenerationProvider
//! ```
//!
//! The store and both providers are built lazily, once per process, and
//! shared read-only by concurrent requests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ragchat_retrieval::{AnswerService, RagConfig};
//!
//! let config = RagConfig::new("public/vector_store.json");
//! let service = AnswerService::from_config(&config);
//!
//! let reply = service.answer("What projects are listed?").await?;
//! ```

pub mod answer;
pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod loader;
pub mod once;

pub use answer::{AnswerService, MESSAGE_REQUIRED, build_messages};
pub use config::{
    DEFAULT_SYSTEM_PROMPT, DEFAULT_TOP_K, EmbeddingConfig, EmbeddingProviderType,
    GenerationConfig, RagConfig,
};
pub use engine::{
    EngineStats, RetrievalEngine, RetrievalEngineBuilder, RetrievedPassage,
    build_embedding_provider,
};
pub use error::{ErrorKind, GenerationError, Result, RetrievalError};
pub use generation::{ChatCompletionsProvider, ChatMessage, GenerationProvider, Role};
pub use loader::StoreLoader;
pub use once::InitOnce;
