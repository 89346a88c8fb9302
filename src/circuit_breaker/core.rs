//! Core circuit breaker implementation with async support.

use crate::circuit_breaker::{
    CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerResult, CircuitBreakerState,
    FailureClass, StateData, StateTransition,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::metrics::{Rejection, Uncounted, CIRCUIT_BREAKER_METRICS};

/// How a call was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    /// The single half-open trial
    Trial,
}

/// A thread-safe, async circuit breaker.
///
/// Clones share state, so one instance per backend can be handed to every
/// caller.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Arc<Mutex<StateData>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker in Closed state
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            name = %name,
            failure_threshold = config.failure_threshold,
            recovery_timeout_ms = config.recovery_timeout_ms,
            "Creating circuit breaker"
        );

        CIRCUIT_BREAKER_METRICS
            .state
            .with_label_values(&[&name])
            .set(CircuitBreakerState::Closed.to_metric_value());

        Self {
            name,
            config,
            state: Arc::new(Mutex::new(StateData::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored state. An open circuit whose recovery timeout has elapsed still
    /// reports Open until the next call moves it to HalfOpen.
    pub fn state(&self) -> CircuitBreakerState {
        self.state.lock().state
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute an async operation protected by the circuit breaker.
    ///
    /// Rejected calls never invoke `f`. Errors from `f` are returned unchanged
    /// inside [`CircuitBreakerError::Operation`].
    pub async fn call<F, Fut, T, E>(&self, f: F) -> CircuitBreakerResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: FailureClass + fmt::Display,
    {
        let admission = self.admit::<E>()?;
        let mut guard = TrialGuard {
            breaker: self,
            armed: admission == Admission::Trial,
        };

        let start = Instant::now();
        let result = f().await;
        CIRCUIT_BREAKER_METRICS
            .call_duration
            .with_label_values(&[&self.name])
            .observe(start.elapsed().as_secs_f64());

        guard.armed = false;

        match result {
            Ok(value) => {
                self.on_success(admission);
                CIRCUIT_BREAKER_METRICS
                    .successes
                    .with_label_values(&[&self.name])
                    .inc();
                Ok(value)
            }
            Err(err) => {
                let class = err.failure_class();
                if self.config.counts_as_failure(class) {
                    self.on_failure(admission, class, &err);
                    CIRCUIT_BREAKER_METRICS.record_counted_failure(&self.name, class);
                } else {
                    let disposition = if self.config.is_excluded(class) {
                        Uncounted::Excluded
                    } else {
                        Uncounted::Neutral
                    };
                    CIRCUIT_BREAKER_METRICS.record_uncounted_failure(&self.name, class, disposition);
                    debug!(
                        name = %self.name,
                        class = class,
                        error = %err,
                        "Error not counted by circuit breaker"
                    );
                    self.release_trial(admission);
                }
                Err(CircuitBreakerError::Operation(err))
            }
        }
    }

    /// Decide whether a call may run, moving Open to HalfOpen when due
    fn admit<E>(&self) -> CircuitBreakerResult<Admission, E> {
        let mut state = self.state.lock();

        if state.should_attempt_reset(self.config.recovery_timeout(), Instant::now()) {
            let transition = state.transition_to(CircuitBreakerState::HalfOpen);
            self.log_transition(&transition);
        }

        let rejection = match state.state {
            CircuitBreakerState::Closed => {
                CIRCUIT_BREAKER_METRICS.record_admission(&self.name, false);
                return Ok(Admission::Normal);
            }
            CircuitBreakerState::HalfOpen if !state.trial_in_flight => {
                state.trial_in_flight = true;
                debug!(name = %self.name, "Admitting half-open trial call");
                CIRCUIT_BREAKER_METRICS.record_admission(&self.name, true);
                return Ok(Admission::Trial);
            }
            CircuitBreakerState::HalfOpen => Rejection::TrialTaken,
            CircuitBreakerState::Open => Rejection::Open,
        };

        CIRCUIT_BREAKER_METRICS.record_rejection(&self.name, rejection);
        Err(CircuitBreakerError::Open(self.name.clone()))
    }

    fn on_success(&self, admission: Admission) {
        let mut state = self.state.lock();

        match (state.state, admission) {
            (CircuitBreakerState::Closed, _) => state.record_success(),
            (CircuitBreakerState::HalfOpen, Admission::Trial) => {
                state.record_success();
                let transition = state.transition_to(CircuitBreakerState::Closed);
                self.log_transition(&transition);
            }
            // outcome of a call admitted under an earlier state
            _ => {}
        }
    }

    fn on_failure(&self, admission: Admission, class: &str, err: &dyn fmt::Display) {
        let mut state = self.state.lock();

        match (state.state, admission) {
            (CircuitBreakerState::Closed, _) => {
                state.record_failure(Instant::now());
                warn!(
                    name = %self.name,
                    class = class,
                    error = %err,
                    failure_count = state.failure_count,
                    "Operation failed"
                );
                if state.failure_count >= self.config.failure_threshold {
                    let transition = state.transition_to(CircuitBreakerState::Open);
                    self.log_transition(&transition);
                }
            }
            (CircuitBreakerState::HalfOpen, Admission::Trial) => {
                state.record_failure(Instant::now());
                warn!(
                    name = %self.name,
                    class = class,
                    error = %err,
                    "Half-open trial failed"
                );
                let transition = state.transition_to(CircuitBreakerState::Open);
                self.log_transition(&transition);
            }
            _ => {}
        }
    }

    /// Free the half-open slot without deciding the circuit
    fn release_trial(&self, admission: Admission) {
        if admission != Admission::Trial {
            return;
        }
        let mut state = self.state.lock();
        if state.state == CircuitBreakerState::HalfOpen {
            state.trial_in_flight = false;
        }
    }

    fn log_transition(&self, transition: &StateTransition) {
        info!(
            name = %self.name,
            from = %transition.from,
            to = %transition.to,
            reason = %transition.reason,
            "Circuit breaker state transition"
        );

        CIRCUIT_BREAKER_METRICS
            .state
            .with_label_values(&[&self.name])
            .set(transition.to.to_metric_value());

        CIRCUIT_BREAKER_METRICS
            .state_transitions
            .with_label_values(&[
                &self.name,
                &transition.from.to_string(),
                &transition.to.to_string(),
            ])
            .inc();
    }

    /// Get a snapshot of this circuit breaker
    pub fn stats(&self) -> CircuitBreakerStats {
        let state = self.state.lock();
        CircuitBreakerStats {
            name: self.name.clone(),
            state: state.state,
            failure_count: state.failure_count,
            failure_threshold: self.config.failure_threshold,
            transition_count: state.transition_count,
            last_state_change: state.last_state_change,
            last_failure_at: state.last_failure_at,
            trial_in_flight: state.trial_in_flight,
        }
    }

    /// Manually reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if state.state != CircuitBreakerState::Closed {
            let transition = state.transition_to(CircuitBreakerState::Closed);
            self.log_transition(&transition);
        }
        state.failure_count = 0;
    }

    /// Force the circuit breaker to open state
    pub fn force_open(&self) {
        let mut state = self.state.lock();
        if state.state != CircuitBreakerState::Open {
            state.last_failure_time = Some(Instant::now());
            let transition = state.transition_to(CircuitBreakerState::Open);
            self.log_transition(&transition);
        }
    }
}

/// Releases the half-open slot when a trial call is dropped before finishing
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(name = %self.breaker.name, "Half-open trial dropped");
            CIRCUIT_BREAKER_METRICS
                .dropped_trials
                .with_label_values(&[&self.breaker.name])
                .inc();
            self.breaker.release_trial(Admission::Trial);
        }
    }
}

/// Statistics for a circuit breaker
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitBreakerState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub transition_count: u64,
    pub last_state_change: DateTime<Utc>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub trial_in_flight: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("{0} failure")]
    struct TestError(&'static str);

    impl FailureClass for TestError {
        fn failure_class(&self) -> &str {
            self.0
        }
    }

    fn breaker(threshold: u32, recovery_ms: u64) -> CircuitBreaker {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(threshold)
            .recovery_timeout(Duration::from_millis(recovery_ms))
            .build()
            .unwrap();
        CircuitBreaker::new("test", config)
    }

    async fn fail(breaker: &CircuitBreaker, class: &'static str) {
        let _ = breaker
            .call(|| async move { Err::<i32, _>(TestError(class)) })
            .await;
    }

    #[tokio::test]
    async fn test_successful_call() {
        let breaker = breaker(3, 1000);
        let result = breaker.call(|| async { Ok::<_, TestError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
    }

    #[tokio::test]
    async fn test_operation_error_is_returned_unchanged() {
        let breaker = breaker(3, 1000);
        let result = breaker
            .call(|| async { Err::<i32, _>(TestError("timeout")) })
            .await;
        match result {
            Err(CircuitBreakerError::Operation(TestError(class))) => assert_eq!(class, "timeout"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert_eq!(breaker.stats().failure_count, 1);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let breaker = breaker(3, 1000);
        fail(&breaker, "timeout").await;
        fail(&breaker, "timeout").await;
        assert_eq!(breaker.stats().failure_count, 2);

        let _ = breaker.call(|| async { Ok::<_, TestError>(1) }).await;
        assert_eq!(breaker.stats().failure_count, 0);
        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let breaker = breaker(2, 60_000);
        fail(&breaker, "backend").await;
        fail(&breaker, "backend").await;
        assert_eq!(breaker.state(), CircuitBreakerState::Open);

        let invoked = AtomicUsize::new(0);
        let result = breaker
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(1)
            })
            .await;

        assert!(matches!(result, Err(CircuitBreakerError::Open(_))));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_excluded_failures_do_not_count() {
        let breaker = breaker(1, 1000);
        fail(&breaker, "bad_request").await;
        fail(&breaker, "cancelled").await;
        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
        assert_eq!(breaker.stats().failure_count, 0);
    }

    #[tokio::test]
    async fn test_unlisted_class_is_neutral() {
        let breaker = breaker(1, 1000);
        fail(&breaker, "protocol").await;
        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_trial_success_closes() {
        let breaker = breaker(1, 30);
        fail(&breaker, "timeout").await;
        assert_eq!(breaker.state(), CircuitBreakerState::Open);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let result = breaker.call(|| async { Ok::<_, TestError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
        assert_eq!(breaker.stats().transition_count, 3);
    }

    #[tokio::test]
    async fn test_half_open_trial_failure_reopens() {
        let breaker = breaker(1, 200);
        fail(&breaker, "timeout").await;

        tokio::time::sleep(Duration::from_millis(250)).await;
        fail(&breaker, "connection").await;
        assert_eq!(breaker.state(), CircuitBreakerState::Open);

        // timestamp was refreshed, so the circuit stays open
        let result = breaker.call(|| async { Ok::<_, TestError>(1) }).await;
        assert!(result.unwrap_err().is_open());
    }

    #[tokio::test]
    async fn test_half_open_neutral_error_frees_trial() {
        let breaker = breaker(1, 30);
        fail(&breaker, "timeout").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        fail(&breaker, "bad_request").await;
        assert_eq!(breaker.state(), CircuitBreakerState::HalfOpen);
        assert!(!breaker.stats().trial_in_flight);

        let result = breaker.call(|| async { Ok::<_, TestError>(1) }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_rejects_concurrent_callers() {
        let breaker = breaker(1, 30);
        fail(&breaker, "timeout").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let trial_breaker = breaker.clone();
        let trial = tokio::spawn(async move {
            trial_breaker
                .call(|| async move {
                    let _ = started_tx.send(());
                    let _ = release_rx.await;
                    Ok::<_, TestError>(1)
                })
                .await
        });

        started_rx.await.unwrap();
        let rejected = breaker.call(|| async { Ok::<_, TestError>(2) }).await;
        assert!(rejected.unwrap_err().is_open());

        release_tx.send(()).unwrap();
        assert_eq!(trial.await.unwrap().unwrap(), 1);
        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
    }

    #[tokio::test]
    async fn test_dropped_trial_releases_slot() {
        let breaker = breaker(1, 30);
        fail(&breaker, "timeout").await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let pending = breaker.call(|| async {
            std::future::pending::<()>().await;
            Ok::<_, TestError>(1)
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert!(!breaker.stats().trial_in_flight);

        let result = breaker.call(|| async { Ok::<_, TestError>(2) }).await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_manual_reset_and_force_open() {
        let breaker = breaker(5, 60_000);

        breaker.force_open();
        assert_eq!(breaker.state(), CircuitBreakerState::Open);
        let result = breaker.call(|| async { Ok::<_, TestError>(1) }).await;
        assert!(result.unwrap_err().is_open());

        breaker.reset();
        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
        let result = breaker.call(|| async { Ok::<_, TestError>(1) }).await;
        assert!(result.is_ok());
    }

    fn admissions(name: &str, admission: &str) -> f64 {
        CIRCUIT_BREAKER_METRICS
            .admissions
            .with_label_values(&[name, admission])
            .get()
    }

    #[tokio::test]
    async fn test_metrics_split_counted_and_uncounted_failures() {
        let breaker = CircuitBreaker::new("metrics-classes", CircuitBreakerConfig::default());

        let _ = breaker
            .call(|| async { Err::<i32, _>(TestError("timeout")) })
            .await;
        let _ = breaker
            .call(|| async { Err::<i32, _>(TestError("bad_request")) })
            .await;
        let _ = breaker
            .call(|| async { Err::<i32, _>(TestError("protocol")) })
            .await;

        let metrics = &*CIRCUIT_BREAKER_METRICS;
        assert_eq!(
            metrics
                .failed_calls
                .with_label_values(&["metrics-classes", "timeout"])
                .get(),
            1.0
        );
        assert_eq!(
            metrics
                .uncounted_failures
                .with_label_values(&["metrics-classes", "bad_request", "excluded"])
                .get(),
            1.0
        );
        assert_eq!(
            metrics
                .uncounted_failures
                .with_label_values(&["metrics-classes", "protocol", "neutral"])
                .get(),
            1.0
        );
        assert_eq!(admissions("metrics-classes", "normal"), 3.0);
    }

    #[tokio::test]
    async fn test_metrics_count_trial_admissions_and_rejections() {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(1)
            .recovery_timeout(Duration::from_millis(30))
            .build()
            .unwrap();
        let breaker = CircuitBreaker::new("metrics-trial", config);

        fail(&breaker, "timeout").await;
        let _ = breaker.call(|| async { Ok::<_, TestError>(1) }).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = breaker.call(|| async { Ok::<_, TestError>(1) }).await;

        assert_eq!(admissions("metrics-trial", "normal"), 1.0);
        assert_eq!(admissions("metrics-trial", "trial"), 1.0);
        assert_eq!(
            CIRCUIT_BREAKER_METRICS
                .rejections
                .with_label_values(&["metrics-trial", "open"])
                .get(),
            1.0
        );
        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
    }

    #[tokio::test]
    async fn test_stats() {
        let breaker = breaker(4, 1000);
        let stats = breaker.stats();
        assert_eq!(stats.name, "test");
        assert_eq!(stats.state, CircuitBreakerState::Closed);
        assert_eq!(stats.failure_count, 0);
        assert_eq!(stats.failure_threshold, 4);
        assert!(stats.last_failure_at.is_none());
    }
}
