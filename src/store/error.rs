//! Error types for document store calls

use crate::circuit_breaker::FailureClass;
use crate::error::AppError;
use crate::retry::{Cancelled, Retryable};

/// Result type for document store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by a [`DocumentStore`](super::DocumentStore)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The call did not finish within its deadline
    #[error("Store call timed out: {0}")]
    Timeout(String),

    /// Overload or temporary unavailability (429, 502, 503, 504)
    #[error("Store temporarily unavailable: {0}")]
    Transient(String),

    /// The backend could not be reached
    #[error("Store connection failed: {0}")]
    Connection(String),

    /// Any other server-side failure
    #[error("Store backend error: {0}")]
    Backend(String),

    /// The backend rejected the request as malformed
    #[error("Store rejected request: {0}")]
    BadRequest(String),

    /// The backend answered with a body we could not decode
    #[error("Unexpected store response: {0}")]
    Protocol(String),

    #[error("Store call cancelled")]
    Cancelled,
}

impl StoreError {
    /// Stable class name used for circuit accounting and metrics
    pub fn class(&self) -> &'static str {
        match self {
            StoreError::Timeout(_) => "timeout",
            StoreError::Transient(_) => "transient",
            StoreError::Connection(_) => "connection",
            StoreError::Backend(_) => "backend",
            StoreError::BadRequest(_) => "bad_request",
            StoreError::Protocol(_) => "protocol",
            StoreError::Cancelled => "cancelled",
        }
    }

    /// Map an HTTP status from the backend
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status, truncate(body, 512));
        match status {
            // a missing document is a GetOutcome, so 404 here means a missing index
            400 | 404 => StoreError::BadRequest(message),
            429 | 502 | 503 | 504 => StoreError::Transient(message),
            _ => StoreError::Backend(message),
        }
    }
}

fn truncate(body: &str, max: usize) -> &str {
    if body.len() <= max {
        return body;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

impl Retryable for StoreError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout(_) | StoreError::Transient(_) | StoreError::Connection(_)
        )
    }
}

impl FailureClass for StoreError {
    fn failure_class(&self) -> &str {
        self.class()
    }
}

impl From<Cancelled> for StoreError {
    fn from(_: Cancelled) -> Self {
        StoreError::Cancelled
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(err.to_string())
        } else if err.is_connect() {
            StoreError::Connection(err.to_string())
        } else if err.is_decode() {
            StoreError::Protocol(err.to_string())
        } else if let Some(status) = err.status() {
            StoreError::from_status(status.as_u16(), &err.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Protocol(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(msg) => AppError::Timeout(msg),
            StoreError::BadRequest(msg) => AppError::Validation(msg),
            StoreError::Cancelled => AppError::Cancelled,
            other => AppError::Backend(other.to_string()),
        }
    }
}
