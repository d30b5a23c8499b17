//! The full pipeline over real HTTP providers pointed at mock servers.

use std::io::Write;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use ragchat_embeddings::HuggingFaceProvider;
use ragchat_retrieval::{
    AnswerService, ChatCompletionsProvider, ErrorKind, RagConfig, RetrievalEngine,
};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STORE: &str = r#"{
  "model": "sentence-transformers/all-MiniLM-L6-v2",
  "chunks": [
    {"text": "The cache is flushed nightly.", "embedding": [0.0, 1.0, 0.0]},
    {"text": "Deploys run from the main branch.", "embedding": [1.0, 0.0, 0.0]},
    {"text": "Backups are kept for 30 days.", "embedding": [0.6, 0.8, 0.0]}
  ]
}"#;

async fn embedding_server(tokens: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(
            "/pipeline/feature-extraction/sentence-transformers/all-MiniLM-L6-v2",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(tokens))
        .mount(&server)
        .await;
    server
}

async fn chat_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "From the main branch." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_question_is_answered_from_top_passages() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(STORE.as_bytes()).unwrap();

    // Two token vectors that mean-pool to the "deploys" direction.
    let embeddings = embedding_server(json!([[2.0, 0.2, 0.0], [2.0, -0.2, 0.0]])).await;
    let chat = chat_server().await;

    let config = RagConfig::new(file.path()).with_top_k(2);
    let engine = RetrievalEngine::builder()
        .with_config(config.clone())
        .with_embedding_provider(HuggingFaceProvider::new().with_base_url(embeddings.uri()))
        .build();
    let service = AnswerService::new(Arc::new(engine), &config)
        .with_system_prompt("Answer from context.")
        .with_generation_provider(ChatCompletionsProvider::new(
            "gsk-test",
            chat.uri(),
            "llama-3.1-8b-instant",
        ));

    let reply = service.answer("How do deploys work?").await.unwrap();
    assert_eq!(reply, "From the main branch.");

    let requests = chat.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body["messages"],
        json!([
            { "role": "system", "content": "Answer from context." },
            {
                "role": "user",
                "content": "Context:\nDeploys run from the main branch.\nBackups are kept for 30 days.\n\nQuestion:\nHow do deploys work?"
            }
        ])
    );

    let stats = service.engine().stats();
    assert!(stats.store_loaded);
    assert_eq!(stats.chunks, Some(3));
    assert_eq!(
        stats.model.as_deref(),
        Some("sentence-transformers/all-MiniLM-L6-v2")
    );
}

#[tokio::test]
async fn test_retrieve_scores_against_pooled_query() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(STORE.as_bytes()).unwrap();
    let embeddings = embedding_server(json!([[0.0, 3.0, 0.0]])).await;

    let engine = RetrievalEngine::builder()
        .with_store_path(file.path())
        .with_embedding_provider(HuggingFaceProvider::new().with_base_url(embeddings.uri()))
        .build();

    let passages = engine.retrieve("cache", 3).await.unwrap();
    let ranked: Vec<(usize, f32)> = passages.iter().map(|p| (p.index, p.score)).collect();

    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].0, 0);
    assert!((ranked[0].1 - 1.0).abs() < 1e-6);
    assert_eq!(ranked[1].0, 2);
    assert!((ranked[1].1 - 0.8).abs() < 1e-6);
    assert_eq!(ranked[2], (1, 0.0));
}

#[tokio::test]
async fn test_embedding_outage_is_an_embedding_failure() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(STORE.as_bytes()).unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
        .mount(&server)
        .await;

    let engine = RetrievalEngine::builder()
        .with_store_path(file.path())
        .with_embedding_provider(HuggingFaceProvider::new().with_base_url(server.uri()))
        .build();

    let err = engine.retrieve_context("anything", 4).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmbeddingFailure);
    assert!(err.is_retryable());
}
