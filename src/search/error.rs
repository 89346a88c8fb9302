//! Error types for search operations

use crate::circuit_breaker::CircuitBreakerError;
use crate::error::AppError;
use crate::store::StoreError;

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur during search operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    /// Malformed or incomplete request
    #[error("Invalid search request: {0}")]
    Validation(String),

    #[error("Unsupported search mode: {0}")]
    UnsupportedMode(String),

    /// The listing a similarity search was seeded with does not exist
    #[error("Source property not found: {0}")]
    SourceNotFound(String),

    #[error("Search timed out: {0}")]
    Timeout(String),

    /// The backend circuit is open and no call was made
    #[error("Search backend unavailable, circuit '{0}' is open")]
    CircuitOpen(String),

    #[error("Aggregation '{name}' could not be parsed: {message}")]
    Aggregation { name: String, message: String },

    #[error("Result processing failed: {0}")]
    ResultProcessing(String),

    #[error("Search backend error: {0}")]
    Backend(String),

    #[error("Search cancelled")]
    Cancelled,

    #[error("Invalid search configuration: {0}")]
    Configuration(String),
}

impl SearchError {
    /// Whether the failure policy may turn this into a degraded response
    pub fn is_degradable(&self) -> bool {
        matches!(self, SearchError::Timeout(_) | SearchError::Backend(_))
    }

    /// Short label for metrics and degraded responses
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::Validation(_) => "validation",
            SearchError::UnsupportedMode(_) => "unsupported_mode",
            SearchError::SourceNotFound(_) => "source_not_found",
            SearchError::Timeout(_) => "timeout",
            SearchError::CircuitOpen(_) => "circuit_open",
            SearchError::Aggregation { .. } => "aggregation",
            SearchError::ResultProcessing(_) => "result_processing",
            SearchError::Backend(_) => "backend",
            SearchError::Cancelled => "cancelled",
            SearchError::Configuration(_) => "configuration",
        }
    }
}

impl From<validator::ValidationErrors> for SearchError {
    fn from(err: validator::ValidationErrors) -> Self {
        SearchError::Validation(err.to_string())
    }
}

impl From<StoreError> for SearchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(msg) => SearchError::Timeout(msg),
            StoreError::Cancelled => SearchError::Cancelled,
            StoreError::BadRequest(msg) => {
                SearchError::Validation(format!("query rejected by store: {}", msg))
            }
            other => SearchError::Backend(other.to_string()),
        }
    }
}

impl From<CircuitBreakerError<StoreError>> for SearchError {
    fn from(err: CircuitBreakerError<StoreError>) -> Self {
        match err {
            CircuitBreakerError::Open(name) => SearchError::CircuitOpen(name),
            CircuitBreakerError::Operation(err) => err.into(),
        }
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Validation(msg) | SearchError::UnsupportedMode(msg) => {
                AppError::Validation(msg)
            }
            SearchError::SourceNotFound(id) => AppError::NotFound(id),
            SearchError::Timeout(msg) => AppError::Timeout(msg),
            SearchError::CircuitOpen(name) => {
                AppError::Unavailable(format!("circuit '{}' is open", name))
            }
            SearchError::Cancelled => AppError::Cancelled,
            SearchError::Configuration(msg) => AppError::Configuration(msg),
            other => AppError::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            SearchError::from(StoreError::Timeout("5s".into())),
            SearchError::Timeout(_)
        ));
        assert!(matches!(
            SearchError::from(StoreError::Connection("refused".into())),
            SearchError::Backend(_)
        ));
        assert_eq!(SearchError::from(StoreError::Cancelled), SearchError::Cancelled);

        let rejected = SearchError::from(StoreError::BadRequest("parse error".into()));
        assert!(matches!(rejected, SearchError::Validation(_)));
        assert!(!rejected.is_degradable());
    }

    #[test]
    fn test_circuit_error_mapping() {
        let err: SearchError = CircuitBreakerError::<StoreError>::Open("es".into()).into();
        assert_eq!(err, SearchError::CircuitOpen("es".into()));
        assert!(!err.is_degradable());

        let err: SearchError =
            CircuitBreakerError::Operation(StoreError::Transient("503".into())).into();
        assert!(err.is_degradable());
    }

    #[test]
    fn test_app_error_codes() {
        let app: AppError = SearchError::Validation("size".into()).into();
        assert_eq!(app.error_code(), "VALIDATION_ERROR");

        let app: AppError = SearchError::CircuitOpen("es".into()).into();
        assert_eq!(app.error_code(), "SERVICE_UNAVAILABLE");
    }
}
