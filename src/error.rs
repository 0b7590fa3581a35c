//! # Error Handling
//!
//! This module defines custom error types and how they're converted to HTTP responses.
//!
//! ## Error Categories:
//! - **Internal**: Server-side problems (500 errors)
//! - **BadRequest**: Client sent invalid data (400 errors)
//! - **NotFound**: Requested resource doesn't exist (404 errors)
//! - **ConfigError**: Configuration problems (500 errors)
//! - **ValidationError**: Data validation failed (400 errors)
//! - **ServiceUnavailable**: A required external backend is not configured (503 errors)
//!
//! ## JSON Response Format:
//! All errors return JSON with a consistent structure:
//! ```json
//! {
//!   "error": {
//!     "type": "service_unavailable",
//!     "message": "Drug label registry is not configured",
//!     "timestamp": "2025-01-01T12:00:00Z"
//!   }
//! }
//! ```
//!
//! Note that the narrative extraction endpoint deliberately does NOT use
//! these responses for generative-backend failures: those come back as an
//! explicit marker string in the normal response body so the consultation UI
//! can render a failure state inline (see `handlers::transcript`).

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors (upstream failures, task panics, etc.)
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Requested resource was not found
    NotFound(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// User input failed validation rules
    ValidationError(String),

    /// A required external backend (registry, generative model) is not
    /// configured; surfaced before any pipeline work is attempted
    ServiceUnavailable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

/// Converts errors into the JSON HTTP responses API clients see.
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "bad_request",
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "not_found",
                msg.clone(),
            ),
            AppError::ConfigError(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                msg.clone(),
            ),
            AppError::ValidationError(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
            ),
            AppError::ServiceUnavailable(msg) => (
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// JSON parsing errors are almost always due to the client sending malformed
/// data, so they map to 400 rather than 500.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Upstream HTTP failures (generative model, label registry) surface as
/// internal errors when they escape the per-candidate recovery paths.
impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Internal(format!("Upstream request failed: {}", err))
    }
}

/// Type alias for Results that use our custom error type.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_code_mapping() {
        let cases = vec![
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                AppError::ConfigError("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::ValidationError("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.error_response().status(), expected);
        }
    }

    #[test]
    fn test_display_includes_message() {
        let err = AppError::ServiceUnavailable("registry missing".into());
        assert!(err.to_string().contains("registry missing"));
    }
}
