//! Question answering: retrieve context, prompt the model, return the reply.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{GenerationConfig, RagConfig};
use crate::engine::RetrievalEngine;
use crate::error::{GenerationError, Result, RetrievalError};
use crate::generation::{ChatCompletionsProvider, ChatMessage, GenerationProvider};
use crate::once::InitOnce;

/// Reply given to empty questions.
pub const MESSAGE_REQUIRED: &str = "Message required";

/// Answers questions grounded in the passages the engine retrieves.
pub struct AnswerService {
    engine: Arc<RetrievalEngine>,
    generator: InitOnce<Box<dyn GenerationProvider>, GenerationError>,
    generation_config: GenerationConfig,
    system_prompt: String,
    top_k: usize,
    timeout: Option<Duration>,
}

impl AnswerService {
    /// Create a service on top of `engine`. The generation provider is built
    /// from `config` on the first question.
    pub fn new(engine: Arc<RetrievalEngine>, config: &RagConfig) -> Self {
        Self {
            engine,
            generator: InitOnce::new(),
            generation_config: config.generation.clone(),
            system_prompt: config.generation.system_prompt.clone(),
            top_k: config.top_k,
            timeout: config.request_timeout(),
        }
    }

    /// Create a service and its engine from configuration.
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(Arc::new(RetrievalEngine::new(config)), config)
    }

    /// Use this generation provider instead of building one from config.
    pub fn with_generation_provider(mut self, provider: impl GenerationProvider + 'static) -> Self {
        let provider: Box<dyn GenerationProvider> = Box::new(provider);
        self.generator = InitOnce::ready(provider);
        self
    }

    /// Replace the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Number of passages put into each prompt.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Bound the whole answer, retrieval and generation included.
    /// `None` removes the bound.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The retrieval engine.
    pub fn engine(&self) -> &RetrievalEngine {
        &self.engine
    }

    async fn generator(&self) -> Result<Arc<Box<dyn GenerationProvider>>> {
        self.generator
            .get_or_init(|| async {
                let provider = ChatCompletionsProvider::from_config(&self.generation_config)?;
                info!("Using generation model {}", provider.model());
                Ok::<_, GenerationError>(Box::new(provider) as Box<dyn GenerationProvider>)
            })
            .await
            .map_err(RetrievalError::Generation)
    }

    /// Answer `question` from the knowledge base.
    pub async fn answer(&self, question: &str) -> Result<String> {
        if question.trim().is_empty() {
            return Err(RetrievalError::InvalidRequest(MESSAGE_REQUIRED.to_string()));
        }

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.answer_within(question))
                .await
                .map_err(|_| RetrievalError::Timeout(limit))?,
            None => self.answer_within(question).await,
        }
    }

    async fn answer_within(&self, question: &str) -> Result<String> {
        let context = self.engine.retrieve_context(question, self.top_k).await?;
        let messages = build_messages(&self.system_prompt, &context, question);
        let generator = self.generator().await?;

        debug!(
            "Prompting {} with {} bytes of context",
            generator.model(),
            context.len()
        );
        Ok(generator.generate(&messages).await?)
    }

    /// Load the store and build both providers now.
    pub async fn warm_up(&self) -> Result<()> {
        self.engine.warm_up().await?;
        self.generator().await?;
        Ok(())
    }
}

/// Assemble the prompt: the system prompt, then the context and question as
/// one user message.
pub fn build_messages(system_prompt: &str, context: &str, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(format!("Context:\n{context}\n\nQuestion:\n{question}")),
    ]
}
