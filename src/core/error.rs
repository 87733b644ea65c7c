//! Typed error handling for the order pipeline
//!
//! Each collaborator has its own error type so callers can match on the
//! condition they care about instead of inspecting strings.
//!
//! # Error Categories
//!
//! - [`StoreError`]: order store failures (not found, timeout, backend)
//! - [`StreamError`]: message stream failures (cancelled, closed, backend)
//! - [`ReadError`]: outcome of the cache-aside read path
//! - [`WarmUpError`]: fatal cache warm-up failures
//! - [`ConfigError`]: configuration loading and validation
//! - [`ServiceError`]: the HTTP-facing error, rendered as JSON
//!
//! # Example
//!
//! ```rust,ignore
//! match reader.get_order("b563feb7b2b84b6test").await {
//!     Ok(order) => println!("{}", order.track_number),
//!     Err(ReadError::NotFound { order_uid }) => println!("{} is unknown", order_uid),
//!     Err(e) => eprintln!("lookup failed: {}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Store Errors
// =============================================================================

/// Errors returned by an [`OrderStore`](crate::core::OrderStore)
#[derive(Debug, Error)]
pub enum StoreError {
    /// No order is stored under this identifier
    #[error("order '{order_uid}' not found")]
    NotFound { order_uid: String },

    /// The operation did not complete in time
    #[error("store operation '{operation}' timed out")]
    Timeout { operation: String },

    /// The backend failed (connectivity, constraint, decode, ...)
    #[error("{backend} error: {message}")]
    Backend { backend: String, message: String },
}

impl StoreError {
    pub fn not_found(order_uid: impl Into<String>) -> Self {
        StoreError::NotFound {
            order_uid: order_uid.into(),
        }
    }

    pub fn backend(backend: impl Into<String>, message: impl ToString) -> Self {
        StoreError::Backend {
            backend: backend.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

// =============================================================================
// Stream Errors
// =============================================================================

/// Errors returned by an [`OrderStream`](crate::core::OrderStream) or
/// [`OrderPublisher`](crate::core::OrderPublisher)
#[derive(Debug, Error)]
pub enum StreamError {
    /// The cancellation token fired while waiting for a message
    #[error("stream operation cancelled")]
    Cancelled,

    /// The stream has been shut down and will not yield more messages
    #[error("stream closed")]
    Closed,

    /// A message could not be acknowledged because it is unknown to the stream
    #[error("message at offset {offset} is not in flight")]
    UnknownMessage { offset: i64 },

    /// The underlying client failed
    #[error("stream backend error: {message}")]
    Backend { message: String },
}

impl StreamError {
    pub fn backend(message: impl ToString) -> Self {
        StreamError::Backend {
            message: message.to_string(),
        }
    }
}

// =============================================================================
// Read Path Errors
// =============================================================================

/// Outcome of a failed cache-aside lookup
#[derive(Debug, Error)]
pub enum ReadError {
    /// The caller did not supply an identifier
    #[error("missing order_uid")]
    MissingId,

    /// Neither the cache nor the store knows this identifier
    #[error("order '{order_uid}' not found")]
    NotFound { order_uid: String },

    /// Any other store failure; the source is kept for logging only
    #[error("internal error")]
    Internal(#[source] StoreError),
}

// =============================================================================
// Warm-up Errors
// =============================================================================

/// Fatal failure while preloading the cache at startup
#[derive(Debug, Error)]
pub enum WarmUpError {
    #[error("failed to list order identifiers: {0}")]
    ListIds(#[source] StoreError),

    #[error("failed to load order '{order_uid}': {source}")]
    Fetch {
        order_uid: String,
        #[source]
        source: StoreError,
    },
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CONFIG_PATH environment variable is not set")]
    MissingPath,

    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },
}

// =============================================================================
// Service Errors (HTTP)
// =============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// The error type surfaced by HTTP handlers
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("missing order_uid")]
    MissingOrderUid,

    #[error("order not found")]
    NotFound,

    /// Never rendered with its detail
    #[error("internal server error")]
    Internal(String),
}

impl ServiceError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::MissingOrderUid => StatusCode::BAD_REQUEST,
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::MissingOrderUid => "MISSING_ORDER_UID",
            ServiceError::NotFound => "ORDER_NOT_FOUND",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

impl From<ReadError> for ServiceError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::MissingId => ServiceError::MissingOrderUid,
            ReadError::NotFound { .. } => ServiceError::NotFound,
            ReadError::Internal(source) => ServiceError::Internal(source.to_string()),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_error_status_codes() {
        assert_eq!(
            ServiceError::MissingOrderUid.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ServiceError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServiceError::Internal("pool timed out".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let err = ServiceError::Internal("password authentication failed".into());
        let response = err.to_response();
        assert_eq!(response.code, "INTERNAL_ERROR");
        assert_eq!(response.message, "internal server error");
    }

    #[test]
    fn test_read_error_conversion() {
        let err: ServiceError = ReadError::NotFound {
            order_uid: "x".into(),
        }
        .into();
        assert!(matches!(err, ServiceError::NotFound));

        let err: ServiceError = ReadError::Internal(StoreError::backend("PostgreSQL", "down")).into();
        assert!(matches!(err, ServiceError::Internal(_)));
    }

    #[test]
    fn test_store_error_display() {
        assert_eq!(
            StoreError::not_found("abc").to_string(),
            "order 'abc' not found"
        );
        assert_eq!(
            StoreError::backend("PostgreSQL", "connection refused").to_string(),
            "PostgreSQL error: connection refused"
        );
        assert!(StoreError::not_found("abc").is_not_found());
    }

    #[test]
    fn test_error_response_serialization() {
        let json = serde_json::to_value(ServiceError::NotFound.to_response()).unwrap();
        assert_eq!(json["code"], "ORDER_NOT_FOUND");
        assert_eq!(json["message"], "order not found");
    }
}
