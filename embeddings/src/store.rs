//! The in-memory vector store built from the offline artifact.
//!
//! The artifact is a JSON document of the form:
//!
//! ```json
//! {
//!   "model": "sentence-transformers/all-MiniLM-L6-v2",
//!   "chunks": [
//!     { "text": "...", "embedding": [0.01, -0.2, ...] }
//!   ]
//! }
//! ```
//!
//! `model` is optional. Every embedding must have the same length.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::Embedding;
use crate::error::StoreError;
use crate::similarity::{self, ScoredChunk};

/// An immutable passage of corpus text and its precomputed embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    text: String,
    embedding: Embedding,
    norm: f32,
}

impl Chunk {
    /// Create a chunk, caching the euclidean norm of its embedding.
    pub fn new(text: impl Into<String>, embedding: Embedding) -> Self {
        let norm = similarity::l2_norm(&embedding);
        Self {
            text: text.into(),
            embedding,
            norm,
        }
    }

    /// The passage content.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The precomputed embedding.
    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub(crate) fn norm(&self) -> f32 {
        self.norm
    }
}

/// An ordered, non-empty collection of chunks sharing one dimensionality.
///
/// Chunk order is the artifact order and is what ties are broken by when
/// ranking.
#[derive(Debug, Clone)]
pub struct VectorStore {
    chunks: Vec<Chunk>,
    dimension: usize,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawArtifact {
    model: Option<String>,
    chunks: Option<Vec<RawChunk>>,
}

#[derive(Debug, Deserialize)]
struct RawChunk {
    text: Option<String>,
    embedding: Option<Embedding>,
}

impl VectorStore {
    /// Build a store from chunks, validating each one.
    pub fn new(chunks: Vec<Chunk>) -> Result<Self, StoreError> {
        let Some(first) = chunks.first() else {
            return Err(StoreError::Malformed("store contains no chunks".to_string()));
        };

        let dimension = first.embedding.len();
        if dimension == 0 {
            return Err(StoreError::Malformed(
                "chunk 0 has an empty embedding".to_string(),
            ));
        }

        for (index, chunk) in chunks.iter().enumerate() {
            if chunk.text.is_empty() {
                return Err(StoreError::Malformed(format!("chunk {index} has empty text")));
            }
            if chunk.embedding.len() != dimension {
                return Err(StoreError::Malformed(format!(
                    "chunk {index} has {} dimensions, expected {dimension}",
                    chunk.embedding.len()
                )));
            }
            if chunk.embedding.iter().any(|x| !x.is_finite()) {
                return Err(StoreError::Malformed(format!(
                    "chunk {index} has a non-finite embedding value"
                )));
            }
        }

        Ok(Self {
            chunks,
            dimension,
            model: None,
        })
    }

    /// Record the model the store was built with.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Parse and validate a store from the artifact's JSON text.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let raw: RawArtifact = serde_json::from_str(json)?;

        let raw_chunks = raw
            .chunks
            .ok_or_else(|| StoreError::Malformed("missing `chunks` list".to_string()))?;

        let chunks = raw_chunks
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let text = raw.text.ok_or_else(|| {
                    StoreError::Malformed(format!("chunk {index} is missing `text`"))
                })?;
                let embedding = raw.embedding.ok_or_else(|| {
                    StoreError::Malformed(format!("chunk {index} is missing `embedding`"))
                })?;
                Ok(Chunk::new(text, embedding))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let store = Self::new(chunks)?;
        Ok(match raw.model {
            Some(model) => store.with_model(model),
            None => store,
        })
    }

    /// Read, parse and validate the artifact at `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| match source.kind() {
                std::io::ErrorKind::NotFound => StoreError::NotFound {
                    path: path.to_path_buf(),
                },
                _ => StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                },
            })?;

        let store = Self::from_json(&content)?;
        info!(
            "Loaded {} chunks ({} dimensions, model {}) from {}",
            store.len(),
            store.dimension,
            store.model.as_deref().unwrap_or("unknown"),
            path.display()
        );
        Ok(store)
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the store has no chunks. Never true for a constructed store.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Length shared by every embedding in the store.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Model the artifact says it was built with, if recorded.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// All chunks in store order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Chunk at `index`.
    pub fn get(&self, index: usize) -> Option<&Chunk> {
        self.chunks.get(index)
    }

    /// Rank every chunk against `query` and return the best `k`.
    pub fn find_top_k(&self, query: &[f32], k: usize) -> crate::Result<Vec<ScoredChunk<'_>>> {
        similarity::find_top_k(query, self, k)
    }
}
