//! Retrieval orchestration: embed the query, rank the store, build context.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ragchat_embeddings::{
    Embedding, EmbeddingError, EmbeddingProvider, EmbeddingRequest, HuggingFaceProvider,
    OpenAIProvider, VectorStore,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{EmbeddingConfig, EmbeddingProviderType, RagConfig};
use crate::error::{Result, RetrievalError};
use crate::loader::StoreLoader;
use crate::once::InitOnce;

/// A retrieved passage with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    /// Position of the chunk in the store.
    pub index: usize,

    /// Passage text.
    pub text: String,

    /// Cosine similarity to the query.
    pub score: f32,
}

/// Turns questions into ranked passages from the vector store.
///
/// The store and the embedding provider are built on first use and shared
/// by every request afterwards.
pub struct RetrievalEngine {
    /// Lazily loaded vector store.
    store: StoreLoader,

    /// Lazily built embedding provider.
    embedder: InitOnce<Box<dyn EmbeddingProvider>, EmbeddingError>,

    /// Settings the embedder is built from.
    embedding_config: EmbeddingConfig,

    /// Passages retrieved when the caller does not say.
    top_k: usize,
}

impl RetrievalEngine {
    /// Create an engine from configuration. Nothing is loaded yet.
    pub fn new(config: &RagConfig) -> Self {
        Self {
            store: StoreLoader::new(&config.store_path),
            embedder: InitOnce::new(),
            embedding_config: config.embedding.clone(),
            top_k: config.top_k,
        }
    }

    /// Create a new engine builder.
    pub fn builder() -> RetrievalEngineBuilder {
        RetrievalEngineBuilder::new()
    }

    /// Default number of passages per query.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    async fn embedder(&self) -> Result<Arc<Box<dyn EmbeddingProvider>>> {
        self.embedder
            .get_or_init(|| async { build_embedding_provider(&self.embedding_config) })
            .await
            .map_err(RetrievalError::Embedding)
    }

    /// Embed `query` with mean pooling and unit normalization.
    pub async fn embed_query(&self, query: &str) -> Result<Embedding> {
        let embedder = self.embedder().await?;
        let response = embedder.embed(EmbeddingRequest::new(query)).await?;
        Ok(response.embedding)
    }

    /// Return the `k` passages most similar to `query`, best first.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }
        if k == 0 {
            return Err(RetrievalError::InvalidRequest(
                "k must be at least 1".to_string(),
            ));
        }

        let store = self.store.load().await?;
        let embedding = self.embed_query(query).await?;

        let passages: Vec<RetrievedPassage> = store
            .find_top_k(&embedding, k)?
            .into_iter()
            .map(|scored| RetrievedPassage {
                index: scored.index,
                text: scored.text.to_string(),
                score: scored.score,
            })
            .collect();

        debug!(
            "Retrieved {} passages: {:?}",
            passages.len(),
            passages
                .iter()
                .map(|p| (p.index, p.score))
                .collect::<Vec<_>>()
        );

        Ok(passages)
    }

    /// Return the `k` best passages joined by newlines, best first.
    pub async fn retrieve_context(&self, query: &str, k: usize) -> Result<String> {
        let passages = self.retrieve(query, k).await?;
        Ok(passages
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Load the store and build the embedder now instead of on first query.
    pub async fn warm_up(&self) -> Result<()> {
        let store = self.store.load().await?;
        let embedder = self.embedder().await?;

        if !embedder.is_available() {
            return Err(EmbeddingError::ProviderNotConfigured(format!(
                "{} embeddings are missing credentials",
                embedder.name()
            ))
            .into());
        }
        if embedder.default_dimension() != store.dimension() {
            warn!(
                "Vector store has {} dimensions but {} produces {}",
                store.dimension(),
                embedder.default_model(),
                embedder.default_dimension()
            );
        }
        if let Some(built_with) = store.model()
            && !built_with.ends_with(embedder.default_model())
        {
            warn!(
                "Vector store was built with {built_with} but queries use {}",
                embedder.default_model()
            );
        }

        info!(
            "Retrieval engine ready: {} chunks, {} dimensions, embedder {}",
            store.len(),
            store.dimension(),
            embedder.name()
        );
        Ok(())
    }

    /// Get engine statistics.
    pub fn stats(&self) -> EngineStats {
        match self.store.loaded() {
            Some(store) => EngineStats {
                store_loaded: true,
                chunks: Some(store.len()),
                dimension: Some(store.dimension()),
                model: store.model().map(str::to_string),
            },
            None => EngineStats {
                store_loaded: false,
                chunks: None,
                dimension: None,
                model: None,
            },
        }
    }
}

/// Build the embedding provider described by `config`.
pub fn build_embedding_provider(
    config: &EmbeddingConfig,
) -> std::result::Result<Box<dyn EmbeddingProvider>, EmbeddingError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .build()?;
    let api_key = std::env::var(config.api_key_env())
        .ok()
        .filter(|key| !key.trim().is_empty());

    let provider: Box<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderType::HuggingFace => {
            let mut provider = HuggingFaceProvider::new().with_client(client);
            if let Some(key) = api_key {
                provider = provider.with_api_key(key);
            }
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url);
            }
            if let Some(model) = &config.model {
                provider = provider.with_model(model);
            }
            Box::new(provider)
        }
        EmbeddingProviderType::OpenAI => {
            let key = api_key.ok_or_else(|| {
                EmbeddingError::ProviderNotConfigured(format!(
                    "{} is not set",
                    config.api_key_env()
                ))
            })?;
            let mut provider = OpenAIProvider::new().with_client(client).with_api_key(key);
            if let Some(url) = &config.base_url {
                provider = provider.with_base_url(url);
            }
            if let Some(model) = &config.model {
                provider = provider.with_model(model);
            }
            Box::new(provider)
        }
    };

    info!(
        "Using {} embeddings with model {}",
        provider.name(),
        provider.default_model()
    );
    Ok(provider)
}

/// Builder for [`RetrievalEngine`].
pub struct RetrievalEngineBuilder {
    config: RagConfig,
    store: Option<VectorStore>,
    embedder: Option<Box<dyn EmbeddingProvider>>,
}

impl RetrievalEngineBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: RagConfig::default(),
            store: None,
            embedder: None,
        }
    }

    /// Start from an existing configuration.
    pub fn with_config(mut self, config: RagConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the vector store path.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store_path = path.into();
        self
    }

    /// Use an already-built store instead of reading one from disk.
    pub fn with_store(mut self, store: VectorStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Use this embedding provider instead of building one from config.
    pub fn with_embedding_provider(mut self, provider: impl EmbeddingProvider + 'static) -> Self {
        let provider: Box<dyn EmbeddingProvider> = Box::new(provider);
        self.embedder = Some(provider);
        self
    }

    /// Set the default number of passages per query.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.config.top_k = top_k;
        self
    }

    /// Build the engine.
    pub fn build(self) -> RetrievalEngine {
        let mut engine = RetrievalEngine::new(&self.config);
        if let Some(store) = self.store {
            engine.store = StoreLoader::with_store(store);
        }
        if let Some(embedder) = self.embedder {
            engine.embedder = InitOnce::ready(embedder);
        }
        engine
    }
}

impl Default for RetrievalEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the retrieval engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Whether the store has been loaded.
    pub store_loaded: bool,

    /// Number of chunks in the store.
    pub chunks: Option<usize>,

    /// Embedding dimensionality of the store.
    pub dimension: Option<usize>,

    /// Model recorded in the artifact.
    pub model: Option<String>,
}
