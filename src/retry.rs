//! Bounded retry with exponential backoff and cooperative cancellation.
//!
//! Only errors that report themselves as transient are retried. The final
//! error is returned unchanged, so callers see the same type whether or not a
//! retry happened.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::metrics::RETRY_ATTEMPTS_TOTAL;

/// Errors that may succeed when the same call is repeated
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

/// Marker produced when a caller cancels an in-flight operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Cloneable cancellation handle. Cancelling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct Cancellation {
    sender: Arc<watch::Sender<bool>>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`Cancellation::cancel`] has been called
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        loop {
            let cancelled = *receiver.borrow_and_update();
            if cancelled {
                return;
            }
            if receiver.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry policy for store calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub min_wait_ms: u64,
    pub max_wait_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_wait_ms: 100,
            max_wait_ms: 2_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before attempt `attempt + 1`: `min(max_wait, min_wait * multiplier^(attempt-1))`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let millis = self.min_wait_ms as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_wait_ms as f64);
        Duration::from_millis(capped as u64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(AppError::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.min_wait_ms > self.max_wait_ms {
            return Err(AppError::Configuration(format!(
                "retry.min_wait_ms ({}) must not exceed retry.max_wait_ms ({})",
                self.min_wait_ms, self.max_wait_ms
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(AppError::Configuration(format!(
                "retry.multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn min_wait(mut self, wait: Duration) -> Self {
        self.config.min_wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn max_wait(mut self, wait: Duration) -> Self {
        self.config.max_wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.config.multiplier = multiplier;
        self
    }

    pub fn build(self) -> Result<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Runs an operation under a [`RetryConfig`]
#[derive(Debug, Clone, Default)]
pub struct RetryHandler {
    config: RetryConfig,
}

impl RetryHandler {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `op` until it succeeds, fails permanently, runs out of attempts or
    /// is cancelled.
    ///
    /// Cancellation is observed while an attempt runs (the attempt future is
    /// dropped) and during the backoff sleep.
    pub async fn run<F, Fut, T, E>(
        &self,
        operation: &str,
        cancellation: &Cancellation,
        mut op: F,
    ) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Retryable + From<Cancelled> + fmt::Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if cancellation.is_cancelled() {
                return Err(E::from(Cancelled));
            }

            attempt += 1;
            debug!(
                operation = operation,
                attempt = attempt,
                max_attempts = max_attempts,
                "Executing attempt"
            );

            let result = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    debug!(operation = operation, attempt = attempt, "Attempt cancelled");
                    return Err(E::from(Cancelled));
                }
                result = op() => result,
            };

            let err = match result {
                Ok(value) => {
                    if attempt > 1 {
                        info!(
                            operation = operation,
                            attempts = attempt,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                debug!(operation = operation, error = %err, "Permanent failure, not retrying");
                return Err(err);
            }

            if attempt >= max_attempts {
                warn!(
                    operation = operation,
                    attempts = attempt,
                    error = %err,
                    "Retry attempts exhausted"
                );
                return Err(err);
            }

            let delay = self.config.delay_for_attempt(attempt);
            warn!(
                operation = operation,
                attempt = attempt,
                max_attempts = max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient failure, retrying"
            );
            RETRY_ATTEMPTS_TOTAL.with_label_values(&[operation]).inc();

            tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    debug!(operation = operation, "Backoff cancelled");
                    return Err(E::from(Cancelled));
                }
                _ = sleep(delay) => {}
            }
        }
    }
}
