//! Process-wide access to the vector store.

use std::path::PathBuf;
use std::sync::Arc;

use ragchat_embeddings::{StoreError, VectorStore};
use tracing::info;

use crate::error::{Result, RetrievalError};
use crate::once::InitOnce;

/// Loads the vector store on first use and hands out the shared instance.
///
/// A failed load is remembered: every later call reports the same
/// `StoreUnavailable` error without touching the disk again.
#[derive(Debug)]
pub struct StoreLoader {
    path: PathBuf,
    store: InitOnce<VectorStore, StoreError>,
}

impl StoreLoader {
    /// Create a loader for the artifact at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            store: InitOnce::new(),
        }
    }

    /// Create a loader around an already-built store.
    pub fn with_store(store: VectorStore) -> Self {
        Self {
            path: PathBuf::new(),
            store: InitOnce::ready(store),
        }
    }

    /// Return the store, loading it if this is the first call.
    pub async fn load(&self) -> Result<Arc<VectorStore>> {
        self.store
            .get_or_init(|| async {
                info!("Loading vector store from {}", self.path.display());
                VectorStore::load(&self.path).await
            })
            .await
            .map_err(|source| RetrievalError::StoreUnavailable {
                path: self.path.clone(),
                source,
            })
    }

    /// The store, if it has already been loaded successfully.
    pub fn loaded(&self) -> Option<Arc<VectorStore>> {
        match self.store.get() {
            Some(Ok(store)) => Some(Arc::clone(store)),
            _ => None,
        }
    }
}
