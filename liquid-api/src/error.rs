//! Error Types for LIQUID API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! Errors render as `{"error": "...", "code": "..."}` with the code's HTTP
//! status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use liquid_cache::CacheError;
use liquid_core::LiquidError;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigError;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Field format is incorrect
    InvalidFormat,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// No cached resource is registered under the requested key
    ResourceNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Resource key registered twice
    ResourceAlreadyExists,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Upstream fetch failed and no cached data could be served
    UpstreamUnavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,

            ErrorCode::ResourceNotFound => StatusCode::NOT_FOUND,

            ErrorCode::ResourceAlreadyExists => StatusCode::CONFLICT,

            // A failed upstream with nothing cached is reported as a plain 500.
            ErrorCode::InternalError | ErrorCode::UpstreamUnavailable => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct ApiError {
    /// Human-readable error message
    #[serde(rename = "error")]
    pub message: String,

    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
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

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn resource_not_found(key: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("Resource '{}' not found", key),
        )
    }

    pub fn resource_already_exists(key: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ResourceAlreadyExists,
            format!("Resource '{}' is already registered", key),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamUnavailable, message)
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

/// Implement IntoResponse for ApiError to enable automatic error handling in Axum.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Convert from CacheError to ApiError.
impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Fetch { resource, source } => {
                tracing::warn!(resource = %resource, error = %source, "No cached data to serve");
                ApiError::upstream_unavailable(source.to_string())
                    .with_details(serde_json::json!({ "resource": resource }))
            }
            CacheError::UnknownResource(key) => ApiError::resource_not_found(key),
            CacheError::DuplicateResource(key) => ApiError::resource_already_exists(key),
            CacheError::Invalid(err) => err.into(),
            CacheError::Internal { resource, reason } => {
                tracing::error!(resource = %resource, reason = %reason, "Cache invariant violated");
                ApiError::internal_error(format!("Cache error for {}", resource))
            }
        }
    }
}

/// Convert from LiquidError to ApiError.
impl From<LiquidError> for ApiError {
    fn from(err: LiquidError) -> Self {
        match err {
            LiquidError::InvalidConfig { .. } => ApiError::invalid_input(err.to_string()),
            _ => ApiError::new(ErrorCode::InvalidFormat, err.to_string()),
        }
    }
}

/// Convert from ConfigError to ApiError.
impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::invalid_input(err.to_string())
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::internal_error(format!("JSON serialization failed: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
