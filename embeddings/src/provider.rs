//! Embedding providers.
//!
//! Queries must be embedded with the same model, pooling and normalization
//! the offline pipeline used for the corpus, or the scores are meaningless.
//! Two providers are supported: the Hugging Face feature-extraction
//! endpoint (the default, serving sentence-transformers models) and the
//! OpenAI embeddings API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EmbeddingError, Result};
use crate::similarity::{mean_pool, normalize};
use crate::{DEFAULT_DIMENSION, DEFAULT_MODEL, Embedding};

/// How token-level vectors are reduced to one sentence vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pooling {
    /// Average all token vectors.
    #[default]
    Mean,
    /// Expect the provider to return a single sentence vector.
    None,
}

/// Request for generating an embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Text to embed.
    pub text: String,

    /// Model to use (provider-specific).
    pub model: Option<String>,

    /// Pooling applied to token-level output.
    pub pooling: Pooling,

    /// Whether to scale the result to unit length.
    pub normalize: bool,
}

impl EmbeddingRequest {
    /// Create a request with mean pooling and normalization.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
            pooling: Pooling::Mean,
            normalize: true,
        }
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the pooling strategy.
    pub fn with_pooling(mut self, pooling: Pooling) -> Self {
        self.pooling = pooling;
        self
    }

    /// Return the raw vector without scaling it to unit length.
    pub fn without_normalization(mut self) -> Self {
        self.normalize = false;
        self
    }
}

/// Response from embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// The generated embedding.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// Dimension of the embedding.
    pub dimension: usize,
}

impl EmbeddingResponse {
    fn finish(mut embedding: Embedding, model: String, request: &EmbeddingRequest) -> Result<Self> {
        if embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse(
                "provider returned an empty embedding".to_string(),
            ));
        }
        if request.normalize {
            normalize(&mut embedding);
        }

        let dimension = embedding.len();
        Ok(Self {
            embedding,
            model,
            dimension,
        })
    }
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;

    /// Get the default embedding dimension.
    fn default_dimension(&self) -> usize;

    /// Generate an embedding for the given text.
    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse>;

    /// Check if the provider is usable (credentials present, etc.).
    fn is_available(&self) -> bool;
}

/// Turn a non-success response into an error, honoring `retry-after` on 429.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        return Err(EmbeddingError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(EmbeddingError::ApiRequest(format!("{status}: {error_text}")));
    }

    Ok(response)
}

/// Hugging Face feature-extraction provider.
///
/// Talks to `POST {base_url}/pipeline/feature-extraction/{model}`, which
/// serves the sentence-transformers model the corpus was embedded with.
pub struct HuggingFaceProvider {
    /// API token; public models work without one.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Default model.
    default_model: String,
}

impl HuggingFaceProvider {
    /// Create a provider for the default sentence-transformers model.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("HF_API_TOKEN").ok(),
            base_url: "https://api-inference.huggingface.co".to_string(),
            client: reqwest::Client::new(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Set the API token.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

impl Default for HuggingFaceProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// The shapes the feature-extraction pipeline may answer with.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureExtractionOutput {
    /// Already pooled by the server.
    Sentence(Embedding),
    /// One vector per token.
    Tokens(Vec<Embedding>),
    /// Token vectors wrapped in a batch of one.
    Batch(Vec<Vec<Embedding>>),
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceProvider {
    fn name(&self) -> &str {
        "hugging_face"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn default_dimension(&self) -> usize {
        match self.default_model.as_str() {
            "sentence-transformers/all-mpnet-base-v2" => 768,
            _ => DEFAULT_DIMENSION,
        }
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        debug!("Embedding query with Hugging Face model: {model}");

        let body = serde_json::json!({
            "inputs": request.text,
            "options": { "wait_for_model": true }
        });

        let mut builder = self
            .client
            .post(format!(
                "{}/pipeline/feature-extraction/{model}",
                self.base_url
            ))
            .json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = check_status(builder.send().await?).await?;
        let output: FeatureExtractionOutput = response.json().await?;

        let tokens = match output {
            FeatureExtractionOutput::Sentence(embedding) => {
                return EmbeddingResponse::finish(embedding, model, &request);
            }
            FeatureExtractionOutput::Tokens(tokens) => tokens,
            FeatureExtractionOutput::Batch(batch) => batch.into_iter().next().ok_or_else(|| {
                EmbeddingError::InvalidResponse("empty batch in response".to_string())
            })?,
        };

        let embedding = match request.pooling {
            Pooling::Mean => mean_pool(&tokens)?,
            Pooling::None => {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "model returned {} token vectors but pooling is disabled",
                    tokens.len()
                )));
            }
        };

        EmbeddingResponse::finish(embedding, model, &request)
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// OpenAI embedding provider.
///
/// The API returns one pooled vector per input, so `pooling` is ignored.
pub struct OpenAIProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Default model.
    default_model: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    pub fn new() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            default_model: "text-embedding-3-small".to_string(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn default_dimension(&self) -> usize {
        match self.default_model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            EmbeddingError::ProviderNotConfigured("OpenAI API key is not set".to_string())
        })?;

        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        debug!("Embedding query with OpenAI model: {model}");

        let body = serde_json::json!({
            "input": request.text,
            "model": model
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let result: OpenAIEmbeddingResponse = check_status(response).await?.json().await?;

        let embedding = result
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding in response".to_string()))?
            .embedding;

        EmbeddingResponse::finish(embedding, result.model, &request)
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingData {
    embedding: Embedding,
}
