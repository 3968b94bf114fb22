//! Error types for the inference gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Error types for gateway operations.
///
/// The first four variants are caused by the caller and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported arity: {0}")]
    UnsupportedArity(String),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend rejected request: {0}")]
    BackendRejected(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status and machine-readable type for this error.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            Error::MissingField(_) => (StatusCode::BAD_REQUEST, "missing_field"),
            Error::InvalidParameter(_) => (StatusCode::BAD_REQUEST, "invalid_parameter"),
            Error::UnsupportedArity(_) => (StatusCode::BAD_REQUEST, "unsupported_arity"),
            Error::MalformedBody(_) => (StatusCode::BAD_REQUEST, "malformed_body"),
            Error::BackendUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable"),
            Error::BackendRejected(_) => (StatusCode::BAD_GATEWAY, "backend_rejected"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status();

        if status.is_server_error() {
            tracing::warn!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string()
            }
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
