//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use infragen_policy::ValidationError;
use infragen_runtime::{ErrorKind, OrchestratorError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unreadable Terraform is the caller's problem; a broken naming pattern
    /// is the server's.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(ValidationError::Parse { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Validation(ValidationError::InvalidPattern { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Orchestrator(err) => match err.kind() {
                ErrorKind::Input => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
                ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
