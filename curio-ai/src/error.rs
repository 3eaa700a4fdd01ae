//! Error types for the curio-ai HTTP surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::workflow::StartError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - e.g., job already active for the project
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Usage gate refused the run (429)
    #[error("Usage limit reached: {0}")]
    UsageLimited(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// curio-common error
    #[error("Common error: {0}")]
    Common(#[from] curio_common::Error),
}

impl From<StartError> for ApiError {
    fn from(err: StartError) -> Self {
        match err {
            StartError::ProjectNotFound(_) => ApiError::NotFound(err.to_string()),
            StartError::AlreadyActive(_) | StartError::NotAnalyzed(_) => ApiError::Conflict(err.to_string()),
            StartError::UsageDenied(_) => ApiError::UsageLimited(err.to_string()),
            StartError::UnknownBackend(_) => ApiError::BadRequest(err.to_string()),
            StartError::Storage(e) => ApiError::Common(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::UsageLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, "USAGE_LIMITED", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(curio_common::Error::NotFound(msg)) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Common(curio_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
