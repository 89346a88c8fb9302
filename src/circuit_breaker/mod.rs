//! Circuit breaker guarding calls to the document store.
//!
//! - **Closed**: calls pass through; counted failures accumulate and a
//!   success resets them. Reaching the threshold opens the circuit.
//! - **Open**: calls are rejected without running until the recovery timeout
//!   has elapsed since the last failure.
//! - **Half-Open**: exactly one trial call runs; concurrent callers are
//!   rejected. Success closes the circuit, a counted failure reopens it.
//!
//! Errors report a class through [`FailureClass`]; the configuration decides
//! which classes count, which are ignored, and which are neutral.
//!
//! # Example
//!
//! ```no_run
//! use property_search_gateway::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CircuitBreakerConfig::builder()
//!     .failure_threshold(5)
//!     .recovery_timeout(Duration::from_secs(30))
//!     .build()?;
//!
//! let breaker = CircuitBreaker::new("elasticsearch", config);
//! let result = breaker
//!     .call(|| async { Ok::<_, property_search_gateway::store::StoreError>(42) })
//!     .await;
//! # Ok(())
//! # }
//! ```

mod config;
mod core;
mod metrics;
mod state;

pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use core::{CircuitBreaker, CircuitBreakerStats};
pub use metrics::{
    init_circuit_breaker_metrics, CircuitBreakerMetrics, Rejection, Uncounted, CIRCUIT_BREAKER_METRICS,
};
pub use state::{CircuitBreakerState, StateData, StateTransition};

/// Result type for operations protected by a circuit breaker
pub type CircuitBreakerResult<T, E> = std::result::Result<T, CircuitBreakerError<E>>;

/// Classifies an error for circuit accounting
pub trait FailureClass {
    /// Stable, lower-case class name such as `timeout` or `bad_request`
    fn failure_class(&self) -> &str;
}

/// Errors returned by [`CircuitBreaker::call`]
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open (or its half-open trial is taken) and the call was not made
    #[error("Circuit breaker is open for '{0}'")]
    Open(String),

    /// The protected operation ran and failed
    #[error("Operation failed: {0}")]
    Operation(#[source] E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open(_))
    }
}

/// Rejected circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid circuit breaker configuration: {0}")]
pub struct InvalidConfig(pub String);
