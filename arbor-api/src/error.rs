//! Error Types for the Arbor API
//!
//! This module defines error handling for the HTTP layer:
//! - ApiError struct for structured error responses
//! - ErrorCode enum with one code per caller-facing failure
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with a status code chosen by the code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use arbor_core::{ArborError, DocumentId, ErrorKind};

use crate::config::ConfigLoadError;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// The first six mirror [`ErrorKind`]. The rest belong to the HTTP layer
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Referenced document does not exist
    DocumentNotFound,

    /// Attempted to attach a document that already has a parent
    AlreadyHasParent,

    /// Attachment would exceed the configured nesting level
    NestingLevelExceeded,

    /// Malformed payload or field value
    InvalidInput,

    /// Store commit or begin failed; the request had no effect
    TransactionFailed,

    /// Unexpected server-side failure
    InternalError,

    /// Route does not exist
    RouteNotFound,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::DocumentNotFound | ErrorCode::RouteNotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyHasParent => StatusCode::CONFLICT,
            ErrorCode::NestingLevelExceeded => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::TransactionFailed => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::DocumentNotFound => "Document doesn't exist",
            ErrorCode::AlreadyHasParent => "Document already has a parent",
            ErrorCode::NestingLevelExceeded => "Nesting level exceeded",
            ErrorCode::InvalidInput => "Invalid input",
            ErrorCode::TransactionFailed => "Transaction failed",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::RouteNotFound => "Route not found",
        }
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::DocumentNotFound => ErrorCode::DocumentNotFound,
            ErrorKind::AlreadyHasParent => ErrorCode::AlreadyHasParent,
            ErrorKind::NestingLevelExceeded => ErrorCode::NestingLevelExceeded,
            ErrorKind::InvalidInput => ErrorCode::InvalidInput,
            ErrorKind::TransactionFailed => ErrorCode::TransactionFailed,
            ErrorKind::Internal => ErrorCode::InternalError,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::DocumentNotFound => "DOCUMENT_NOT_FOUND",
            ErrorCode::AlreadyHasParent => "ALREADY_HAS_PARENT",
            ErrorCode::NestingLevelExceeded => "NESTING_LEVEL_EXCEEDED",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::TransactionFailed => "TRANSACTION_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::RouteNotFound => "ROUTE_NOT_FOUND",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response returned by every endpoint on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn document_not_found(id: DocumentId) -> Self {
        Self::new(
            ErrorCode::DocumentNotFound,
            format!("Document doesn't exist: {}", id),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn route_not_found(path: &str) -> Self {
        Self::new(ErrorCode::RouteNotFound, format!("No route for {}", path))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<ArborError> for ApiError {
    fn from(err: ArborError) -> Self {
        let code = ErrorCode::from(err.kind());
        match code {
            // Internal failures are logged in full and reported generically.
            ErrorCode::InternalError => {
                tracing::error!(error = %err, "internal error");
                ApiError::from_code(code)
            }
            ErrorCode::TransactionFailed => {
                tracing::warn!(error = %err, "transaction failed");
                ApiError::new(code, err.to_string())
            }
            _ => ApiError::new(code, err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

impl From<ConfigLoadError> for ApiError {
    fn from(err: ConfigLoadError) -> Self {
        ApiError::internal_error(format!("Failed to load configuration: {}", err))
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
