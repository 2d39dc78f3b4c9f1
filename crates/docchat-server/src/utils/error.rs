use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures raised by the dialog core (history, lookup, completion, config).
#[derive(Error, Debug)]
pub enum DialogError {
    #[error("Storage error: {0}")]
    Storage(String),

    /// Lexical reference service failed; callers treat it as "not found".
    #[error("Lookup unavailable: {0}")]
    LookupUnavailable(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Upstream timed out after {0}s")]
    UpstreamTimeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Conversation key cannot be mapped to a history file.
    #[error("Invalid conversation key: {0}")]
    InvalidKey(String),
}

impl DialogError {
    /// Whether the caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DialogError::UpstreamTimeout(_))
    }
}

impl From<sqlx::Error> for DialogError {
    fn from(err: sqlx::Error) -> Self {
        DialogError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for DialogError {
    fn from(err: std::io::Error) -> Self {
        DialogError::Storage(err.to_string())
    }
}

pub type DialogResult<T> = Result<T, DialogError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("LLM timeout: {0}")]
    LlmTimeout(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl From<DialogError> for ApiError {
    fn from(err: DialogError) -> Self {
        let msg = err.to_string();
        match err {
            DialogError::Configuration(_) | DialogError::InvalidKey(_) => ApiError::BadRequest(msg),
            DialogError::Storage(_) => ApiError::DatabaseError(msg),
            DialogError::LookupUnavailable(_) | DialogError::Upstream(_) => ApiError::LlmError(msg),
            DialogError::UpstreamTimeout(_) => ApiError::LlmTimeout(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            },
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError", msg)
            },
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", msg)
            },
            ApiError::LlmError(msg) => {
                tracing::error!("LLM error: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "LlmError", msg)
            },
            ApiError::LlmTimeout(msg) => {
                tracing::warn!("LLM timeout: {}", msg);
                (StatusCode::GATEWAY_TIMEOUT, "LlmTimeout", msg)
            },
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
