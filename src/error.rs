use thiserror::Error;

use crate::circuit_breaker::InvalidConfig;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed input or request
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Search backend failures
    #[error("Backend error: {0}")]
    Backend(String),

    /// A dependency is refusing calls (open circuit)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Backend(_) => "BACKEND_ERROR",
            AppError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Cancelled => "CANCELLED",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Process exit code used by the command-line entry point
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Validation(_) | AppError::Configuration(_) => 2,
            AppError::NotFound(_) => 3,
            AppError::Timeout(_) | AppError::Unavailable(_) | AppError::Backend(_) => 4,
            _ => 1,
        }
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl From<InvalidConfig> for AppError {
    fn from(err: InvalidConfig) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
