use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::{AppError, Result};
use crate::retry::RetryConfig;
use crate::search::SearchConfig;
use crate::store::ElasticsearchConfig;

/// Default location of the optional override file
pub const DEFAULT_CONFIG_PATH: &str = "config/gateway.toml";

/// Prefix for environment overrides, e.g. `PROPERTY_SEARCH__STORE__URL`
pub const ENV_PREFIX: &str = "PROPERTY_SEARCH";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document store connection
    pub store: ElasticsearchConfig,

    /// Query building and execution policy
    pub search: SearchConfig,

    /// Circuit breaker guarding the store
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry policy for store calls
    pub retry: RetryConfig,

    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// The override file is taken from `CONFIG_PATH`, falling back to
    /// [`DEFAULT_CONFIG_PATH`]; it is optional in both cases.
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::build(&config_path, false)
    }

    /// Load configuration with an explicit override file that must exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::Configuration(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        Self::build(&path.to_string_lossy(), true)
    }

    fn build(path: &str, required: bool) -> Result<Self> {
        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file
            .add_source(config::File::new(path, config::FileFormat::Toml).required(required))
            // Override with environment variables (prefix: PROPERTY_SEARCH__)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.search.validate()?;
        self.circuit_breaker.validate()?;
        self.retry.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive used when `RUST_LOG` is unset
    pub log_level: String,

    /// Enable JSON logging
    pub json_logs: bool,

    /// Enable Prometheus metrics
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl ObservabilityConfig {
    pub fn validate(&self) -> Result<()> {
        tracing_subscriber::EnvFilter::try_new(&self.log_level).map_err(|e| {
            AppError::Configuration(format!(
                "observability.log_level '{}' is not a valid filter: {}",
                self.log_level, e
            ))
        })?;
        Ok(())
    }
}
