//! Error handling module for the freight site backend.
//!
//! Three layers: `RemoteError` from the hosted backend, `StoreError` from the
//! content store, and `AppError` mapped onto HTTP status codes and envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const CONFLICT: &str = "CONFLICT";
    pub const BACKEND_UNCONFIGURED: &str = "BACKEND_UNCONFIGURED";
    pub const REMOTE_ERROR: &str = "REMOTE_ERROR";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Failure reported by the remote data client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Credentials rejected or session missing
    Auth(String),
    /// Keyed row does not exist
    NotFound(String),
    /// Unique constraint violated
    Conflict(String),
    /// Query, transport or server failure
    Query(String),
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Auth(msg) => write!(f, "{}", msg),
            RemoteError::NotFound(msg) => write!(f, "{}", msg),
            RemoteError::Conflict(msg) => write!(f, "{}", msg),
            RemoteError::Query(msg) => write!(f, "Backend request failed: {}", msg),
        }
    }
}

impl std::error::Error for RemoteError {}

impl From<sqlx::Error> for RemoteError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return RemoteError::Conflict(db_err.message().to_string());
            }
        }
        RemoteError::Query(err.to_string())
    }
}

/// Error kinds surfaced by the content store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No remote backend was configured. For lead writes the in-memory change
    /// has already been applied when this is returned; nothing was persisted.
    BackendUnconfigured,
    /// The remote call failed
    Remote(RemoteError),
    /// No such record in the in-memory collection
    NotFound(String),
    /// Another article already owns the slug
    SlugConflict(String),
    /// Input rejected before any remote call
    Validation(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::BackendUnconfigured => write!(f, "Backend is not configured"),
            StoreError::Remote(err) => write!(f, "{}", err),
            StoreError::NotFound(msg) => write!(f, "{}", msg),
            StoreError::SlugConflict(slug) => write!(f, "Slug '{}' is already in use", slug),
            StoreError::Validation(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<RemoteError> for StoreError {
    fn from(err: RemoteError) -> Self {
        StoreError::Remote(err)
    }
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Authentication required
    Unauthorized(String),
    /// Resource not found
    NotFound(String),
    /// Validation error
    Validation(String),
    /// Unique key conflict
    Conflict(String),
    /// Remote backend missing
    Unconfigured(String),
    /// Remote backend failure
    Remote(String),
    /// Invalid configuration
    Config(String),
    /// Internal server error
    Internal(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unconfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Remote(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Conflict(_) => codes::CONFLICT,
            AppError::Unconfigured(_) => codes::BACKEND_UNCONFIGURED,
            AppError::Remote(_) => codes::REMOTE_ERROR,
            AppError::Config(_) => codes::CONFIG_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::Unconfigured(msg)
            | AppError::Remote(msg)
            | AppError::Config(msg)
            | AppError::Internal(msg)
            | AppError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::BackendUnconfigured => AppError::Unconfigured(message),
            StoreError::Remote(RemoteError::Auth(_)) => AppError::Unauthorized(message),
            StoreError::Remote(RemoteError::NotFound(_)) => AppError::NotFound(message),
            StoreError::Remote(RemoteError::Conflict(_)) => AppError::Conflict(message),
            StoreError::Remote(RemoteError::Query(_)) => AppError::Remote(message),
            StoreError::NotFound(_) => AppError::NotFound(message),
            StoreError::SlugConflict(_) => AppError::Conflict(message),
            StoreError::Validation(_) => AppError::Validation(message),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorResponse::new(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        let err: AppError = StoreError::BackendUnconfigured.into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), codes::BACKEND_UNCONFIGURED);

        let err: AppError = StoreError::SlugConflict("cargo".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.message(), "Slug 'cargo' is already in use");

        let err: AppError =
            StoreError::Remote(RemoteError::Auth("Invalid login credentials".into())).into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), "Invalid login credentials");
    }
}
