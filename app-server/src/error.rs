//! Mapping of pipeline failures onto HTTP responses.

use axum::Json;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use ragchat_retrieval::{ErrorKind, MESSAGE_REQUIRED, RetrievalError};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// An error on its way to the client.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// 400 with the standard message for a missing question. `reason` is
    /// only logged.
    pub fn message_required(reason: &str) -> Self {
        warn!("Rejected chat request: {reason}");
        Self {
            status: StatusCode::BAD_REQUEST,
            message: MESSAGE_REQUIRED.to_string(),
        }
    }

    /// 405 for methods the route does not serve.
    pub fn method_not_allowed(method: &Method) -> Self {
        warn!("Rejected {method} request to /chat");
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            message: "Method not allowed".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        let status = match err.kind() {
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            let cause = std::error::Error::source(&err)
                .map(ToString::to_string)
                .unwrap_or_default();
            error!(
                kind = ?err.kind(),
                retryable = err.is_retryable(),
                %cause,
                "Chat request failed: {err}"
            );
        } else {
            warn!("Rejected chat request: {err}");
        }

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
