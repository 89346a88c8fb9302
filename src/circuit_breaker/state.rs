//! Circuit breaker state machine.
//!
//! State transitions and the bookkeeping that goes with them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// The current state of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitBreakerState {
    /// Calls pass through, failures are counted
    Closed,
    /// All calls are rejected until the recovery timeout elapses
    Open,
    /// A single trial call decides between Closed and Open
    HalfOpen,
}

impl CircuitBreakerState {
    /// Convert state to numeric value for Prometheus gauge
    pub fn to_metric_value(&self) -> f64 {
        match self {
            CircuitBreakerState::Closed => 0.0,
            CircuitBreakerState::Open => 1.0,
            CircuitBreakerState::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitBreakerState::Closed => write!(f, "closed"),
            CircuitBreakerState::Open => write!(f, "open"),
            CircuitBreakerState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// A recorded state transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: CircuitBreakerState,
    pub to: CircuitBreakerState,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

impl StateTransition {
    pub fn new(from: CircuitBreakerState, to: CircuitBreakerState, reason: String) -> Self {
        Self {
            from,
            to,
            timestamp: Utc::now(),
            reason,
        }
    }
}

/// Internal state data for the circuit breaker.
///
/// Timing decisions use the monotonic clock; the wall-clock fields are only
/// reported through stats.
#[derive(Debug, Clone)]
pub struct StateData {
    pub state: CircuitBreakerState,
    /// Counted failures since the last success or close
    pub failure_count: u32,
    /// Monotonic time of the most recent counted failure
    pub last_failure_time: Option<Instant>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_state_change: DateTime<Utc>,
    pub transition_count: u64,
    /// Set while the half-open trial call is running
    pub trial_in_flight: bool,
}

impl StateData {
    /// Create new state data in Closed state
    pub fn new() -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            failure_count: 0,
            last_failure_time: None,
            last_failure_at: None,
            last_state_change: Utc::now(),
            transition_count: 0,
            trial_in_flight: false,
        }
    }

    pub fn record_success(&mut self) {
        self.failure_count = 0;
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_time = Some(now);
        self.last_failure_at = Some(Utc::now());
    }

    /// Transition to a new state
    pub fn transition_to(&mut self, new_state: CircuitBreakerState) -> StateTransition {
        let transition =
            StateTransition::new(self.state, new_state, self.transition_reason(new_state));

        self.state = new_state;
        self.last_state_change = Utc::now();
        self.transition_count += 1;
        self.trial_in_flight = false;

        if new_state == CircuitBreakerState::Closed {
            self.failure_count = 0;
        }

        transition
    }

    fn transition_reason(&self, new_state: CircuitBreakerState) -> String {
        match (self.state, new_state) {
            (CircuitBreakerState::Closed, CircuitBreakerState::Open) => {
                format!("Failure threshold reached ({} failures)", self.failure_count)
            }
            (CircuitBreakerState::Open, CircuitBreakerState::HalfOpen) => {
                "Recovery timeout elapsed, allowing trial call".to_string()
            }
            (CircuitBreakerState::HalfOpen, CircuitBreakerState::Closed) => {
                "Trial call succeeded".to_string()
            }
            (CircuitBreakerState::HalfOpen, CircuitBreakerState::Open) => {
                "Trial call failed".to_string()
            }
            _ => format!("Transitioned from {} to {}", self.state, new_state),
        }
    }

    /// True once an open circuit has waited `recovery_timeout` since the last failure
    pub fn should_attempt_reset(&self, recovery_timeout: Duration, now: Instant) -> bool {
        if self.state != CircuitBreakerState::Open {
            return false;
        }

        match self.last_failure_time {
            Some(at) => now.saturating_duration_since(at) >= recovery_timeout,
            // forced open without a failure
            None => true,
        }
    }
}

impl Default for StateData {
    fn default() -> Self {
        Self::new()
    }
}
