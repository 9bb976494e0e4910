/// Unified error types for the identity service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum YggError {
    /// Malformed or out-of-range input, reported with the failing field
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Bad credentials or missing/expired session
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Action refused by configured policy
    #[error("Not permitted: {0}")]
    Forbidden(String),

    /// Uniqueness violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Remote skin/cape source or upstream API unreachable or non-2xx
    #[error("External fetch failed: {0}")]
    ExternalFetch(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Persistence-layer failure unrelated to a constraint
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Asset store errors
    #[error("Asset storage error: {0}")]
    AssetStorage(String),

    /// Signing key load/generation failure
    #[error("Signing key error: {0}")]
    Key(String),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl YggError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        YggError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for YggError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            YggError::Validation { .. } => {
                (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string())
            }
            YggError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            YggError::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden", self.to_string()),
            YggError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            YggError::ExternalFetch(_) => {
                (StatusCode::BAD_GATEWAY, "ExternalFetchFailed", self.to_string())
            }
            YggError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            YggError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                "Rate limit exceeded".to_string(),
            ),
            YggError::Storage(_)
            | YggError::AssetStorage(_)
            | YggError::Key(_)
            | YggError::Config(_)
            | YggError::Internal(_)
            | YggError::Io(_) => {
                tracing::error!("Request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    "Internal server error".to_string(), // Don't leak details
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type YggResult<T> = Result<T, YggError>;
