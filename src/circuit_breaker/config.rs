//! Circuit breaker configuration with builder pattern.

use crate::circuit_breaker::InvalidConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Counted failures in Closed state before the circuit opens
    pub failure_threshold: u32,

    /// Time an open circuit waits after the last failure before allowing a trial call
    pub recovery_timeout_ms: u64,

    /// Failure classes that count against the circuit. When empty every
    /// non-excluded class counts.
    pub expected_failures: Vec<String>,

    /// Failure classes that pass through without affecting the circuit
    pub excluded_failures: Vec<String>,
}

impl CircuitBreakerConfig {
    /// Create a new builder for CircuitBreakerConfig
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::default()
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.failure_threshold == 0 {
            return Err(InvalidConfig(
                "failure_threshold must be greater than 0".to_string(),
            ));
        }

        if self.recovery_timeout_ms == 0 {
            return Err(InvalidConfig(
                "recovery_timeout must be greater than 0".to_string(),
            ));
        }

        if let Some(class) = self
            .expected_failures
            .iter()
            .find(|class| self.excluded_failures.contains(class))
        {
            return Err(InvalidConfig(format!(
                "failure class '{}' is both expected and excluded",
                class
            )));
        }

        Ok(())
    }

    pub fn is_excluded(&self, class: &str) -> bool {
        self.excluded_failures.iter().any(|c| c == class)
    }

    /// Whether an error of this class affects the circuit at all
    pub fn counts_as_failure(&self, class: &str) -> bool {
        if self.is_excluded(class) {
            return false;
        }
        self.expected_failures.is_empty() || self.expected_failures.iter().any(|c| c == class)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
            expected_failures: ["timeout", "transient", "connection", "backend"]
                .into_iter()
                .map(String::from)
                .collect(),
            excluded_failures: ["bad_request", "cancelled"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Builder for CircuitBreakerConfig with fluent API
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: Option<u32>,
    recovery_timeout: Option<Duration>,
    expected_failures: Option<Vec<String>>,
    excluded_failures: Option<Vec<String>>,
}

impl CircuitBreakerConfigBuilder {
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    pub fn recovery_timeout(mut self, duration: Duration) -> Self {
        self.recovery_timeout = Some(duration);
        self
    }

    /// Replace the set of counted failure classes
    pub fn expected_failures<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_failures = Some(classes.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the set of ignored failure classes
    pub fn excluded_failures<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_failures = Some(classes.into_iter().map(Into::into).collect());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<CircuitBreakerConfig, InvalidConfig> {
        let default = CircuitBreakerConfig::default();

        let recovery_timeout_ms = match self.recovery_timeout {
            Some(duration) => u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            None => default.recovery_timeout_ms,
        };

        let config = CircuitBreakerConfig {
            failure_threshold: self.failure_threshold.unwrap_or(default.failure_threshold),
            recovery_timeout_ms,
            expected_failures: self.expected_failures.unwrap_or(default.expected_failures),
            excluded_failures: self.excluded_failures.unwrap_or(default.excluded_failures),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.recovery_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_with_defaults() {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(7)
            .build()
            .unwrap();

        assert_eq!(config.failure_threshold, 7);
        assert_eq!(config.recovery_timeout_ms, 30_000);
        assert!(config.expected_failures.contains(&"timeout".to_string()));
    }

    #[test]
    fn test_invalid_thresholds() {
        assert!(CircuitBreakerConfig::builder()
            .failure_threshold(0)
            .build()
            .is_err());
        assert!(CircuitBreakerConfig::builder()
            .recovery_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_overlapping_classes_rejected() {
        let result = CircuitBreakerConfig::builder()
            .expected_failures(["timeout"])
            .excluded_failures(["timeout"])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_failure_classification() {
        let config = CircuitBreakerConfig::default();
        assert!(config.counts_as_failure("timeout"));
        assert!(config.counts_as_failure("backend"));
        assert!(!config.counts_as_failure("bad_request"));
        // neither expected nor excluded
        assert!(!config.counts_as_failure("protocol"));

        let config = CircuitBreakerConfig::builder()
            .expected_failures(Vec::<String>::new())
            .excluded_failures(["cancelled"])
            .build()
            .unwrap();
        assert!(config.counts_as_failure("protocol"));
        assert!(!config.counts_as_failure("cancelled"));
    }
}
