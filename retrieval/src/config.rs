//! Configuration for the retrieval and answer pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// Default number of passages fed to the model.
pub const DEFAULT_TOP_K: usize = 4;

/// Default instructions given to the generation model.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant answering questions about the documents in this knowledge base.

Rules:
- Answer only using provided context.
- If information is missing, say it is not mentioned.
- Speak professionally but naturally.
- Keep answers concise.";

/// Configuration for the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Path to the vector store artifact.
    pub store_path: PathBuf,

    /// Number of passages retrieved per question.
    pub top_k: usize,

    /// Deadline for answering one question, in seconds. Zero disables it.
    pub request_timeout_secs: u64,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Generation provider configuration.
    pub generation: GenerationConfig,
}

impl RagConfig {
    /// Create a configuration reading the store from `store_path`.
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            top_k: DEFAULT_TOP_K,
            request_timeout_secs: 60,
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
        }
    }

    /// Load a configuration from a TOML file. Missing keys take defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RetrievalError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| RetrievalError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| RetrievalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RetrievalError::Config("top_k must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Set the number of passages retrieved per question.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the vector store path.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    /// Set the per-question deadline in seconds; zero disables it.
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// The per-question deadline, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self::new("public/vector_store.json")
    }
}

/// Type of embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// Hugging Face feature-extraction endpoint.
    HuggingFace,
    /// OpenAI embeddings API.
    #[serde(rename = "openai")]
    OpenAI,
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    pub provider: EmbeddingProviderType,

    /// Model to use; the provider default when unset.
    pub model: Option<String>,

    /// API base URL; the provider default when unset.
    pub base_url: Option<String>,

    /// Environment variable holding the API key; the provider's usual
    /// variable when unset.
    pub api_key_env: Option<String>,

    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    /// Environment variable the API key is read from.
    pub fn api_key_env(&self) -> &str {
        match (&self.api_key_env, self.provider) {
            (Some(name), _) => name,
            (None, EmbeddingProviderType::HuggingFace) => "HF_API_TOKEN",
            (None, EmbeddingProviderType::OpenAI) => "OPENAI_API_KEY",
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::HuggingFace,
            model: None,
            base_url: None,
            api_key_env: None,
            timeout_secs: 30,
        }
    }
}

/// Configuration for the generation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Chat model identifier.
    pub model: String,

    /// Base URL of an OpenAI-compatible chat completions API.
    pub base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Instructions sent as the system message.
    pub system_prompt: String,

    /// Sampling temperature; the API default when unset.
    pub temperature: Option<f32>,

    /// Completion length cap; the API default when unset.
    pub max_tokens: Option<u32>,

    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "llama-3.1-8b-instant".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: None,
            max_tokens: None,
            timeout_secs: 60,
        }
    }
}
