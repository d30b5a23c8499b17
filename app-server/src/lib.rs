//! HTTP surface for the chat endpoint.
//!
//! `POST /chat` answers `{"message": ...}` with `{"reply": ...}`; failures
//! come back as `{"error": ...}`. `GET /healthz` reports whether the vector
//! store is loaded.

pub mod error;
pub mod tracing_setup;

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::Method;
use axum::routing::{get, post};
use axum::{Json, Router};
use ragchat_retrieval::AnswerService;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

pub use error::{ApiError, ErrorBody};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    service: Arc<AnswerService>,
}

impl AppState {
    pub fn new(service: Arc<AnswerService>) -> Self {
        Self { service }
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// Successful reply to `POST /chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// Reply to `GET /healthz`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_loaded: bool,
    pub chunks: Option<usize>,
    pub dimension: Option<usize>,
}

/// Build the application router.
pub fn router(service: Arc<AnswerService>) -> Router {
    Router::new()
        .route("/chat", post(chat).fallback(method_not_allowed))
        .route("/healthz", get(healthz))
        .with_state(AppState::new(service))
}

/// Serve the router on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    service: Arc<AnswerService>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("ragchat listening on http://{addr}");
    }
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = match payload {
        Ok(Json(ChatRequest {
            message: Some(message),
        })) => message,
        Ok(_) => return Err(ApiError::message_required("no `message` field")),
        Err(rejection) => return Err(ApiError::message_required(&rejection.body_text())),
    };

    let reply = state.service.answer(&message).await?;
    Ok(Json(ChatResponse { reply }))
}

async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::method_not_allowed(&method)
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.service.engine().stats();
    Json(HealthResponse {
        status: "ok".to_string(),
        store_loaded: stats.store_loaded,
        chunks: stats.chunks,
        dimension: stats.dimension,
    })
}
