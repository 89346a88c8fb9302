//! Prometheus series for the store circuit breaker.
//!
//! Admitted calls are counted by admission kind, so half-open trials stand out
//! from normal traffic. Finished calls are split by how the breaker accounted
//! for them: failures that moved the circuit are labelled by class, and
//! failures it ignored are labelled by class and disposition.

use lazy_static::lazy_static;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};

const NAMESPACE: &str = "property_search";

/// Why a call was turned away without running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Circuit open and the recovery timeout not yet elapsed
    Open,
    /// Circuit half-open with its single trial already running
    TrialTaken,
}

impl Rejection {
    fn as_label(self) -> &'static str {
        match self {
            Rejection::Open => "open",
            Rejection::TrialTaken => "trial_taken",
        }
    }
}

/// How an ignored failure was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uncounted {
    /// Class listed in `excluded_failures`
    Excluded,
    /// Class in neither list while `expected_failures` is non-empty
    Neutral,
}

impl Uncounted {
    fn as_label(self) -> &'static str {
        match self {
            Uncounted::Excluded => "excluded",
            Uncounted::Neutral => "neutral",
        }
    }
}

/// All breaker series, labelled by breaker name
pub struct CircuitBreakerMetrics {
    /// 0 closed, 1 open, 2 half-open
    pub state: GaugeVec,

    /// Labels: name, admission (normal, trial)
    pub admissions: CounterVec,

    /// Labels: name, reason (open, trial_taken)
    pub rejections: CounterVec,

    pub successes: CounterVec,

    /// Failures that count toward opening. Labels: name, class
    pub failed_calls: CounterVec,

    /// Failures the breaker ignored. Labels: name, class, disposition
    pub uncounted_failures: CounterVec,

    /// Half-open trials abandoned before finishing
    pub dropped_trials: CounterVec,

    pub call_duration: HistogramVec,

    /// Labels: name, from_state, to_state
    pub state_transitions: CounterVec,
}

fn counter(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    CounterVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)
        .unwrap_or_else(|e| panic!("Failed to create {} metric: {}", name, e))
}

impl CircuitBreakerMetrics {
    fn new() -> Self {
        Self {
            state: GaugeVec::new(
                Opts::new("circuit_breaker_state", "Current state of the circuit breaker")
                    .namespace(NAMESPACE),
                &["name"],
            )
            .expect("Failed to create circuit_breaker_state metric"),

            admissions: counter(
                "circuit_breaker_admissions_total",
                "Calls let through the circuit breaker",
                &["name", "admission"],
            ),

            rejections: counter(
                "circuit_breaker_rejections_total",
                "Calls rejected without reaching the store",
                &["name", "reason"],
            ),

            successes: counter(
                "circuit_breaker_successes_total",
                "Admitted calls that succeeded",
                &["name"],
            ),

            failed_calls: counter(
                "circuit_breaker_failed_calls_total",
                "Failures counted toward opening the circuit",
                &["name", "class"],
            ),

            uncounted_failures: counter(
                "circuit_breaker_uncounted_failures_total",
                "Failures that left the failure count untouched",
                &["name", "class", "disposition"],
            ),

            dropped_trials: counter(
                "circuit_breaker_dropped_trials_total",
                "Half-open trial calls dropped before completing",
                &["name"],
            ),

            call_duration: HistogramVec::new(
                HistogramOpts::new(
                    "circuit_breaker_call_duration_seconds",
                    "Duration of store calls admitted by the circuit breaker",
                )
                .namespace(NAMESPACE)
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
                &["name"],
            )
            .expect("Failed to create circuit_breaker_call_duration_seconds metric"),

            state_transitions: counter(
                "circuit_breaker_state_transitions_total",
                "Circuit breaker state transitions",
                &["name", "from_state", "to_state"],
            ),
        }
    }

    pub fn record_admission(&self, name: &str, trial: bool) {
        let admission = if trial { "trial" } else { "normal" };
        self.admissions.with_label_values(&[name, admission]).inc();
    }

    pub fn record_rejection(&self, name: &str, reason: Rejection) {
        self.rejections
            .with_label_values(&[name, reason.as_label()])
            .inc();
    }

    pub fn record_counted_failure(&self, name: &str, class: &str) {
        self.failed_calls.with_label_values(&[name, class]).inc();
    }

    pub fn record_uncounted_failure(&self, name: &str, class: &str, disposition: Uncounted) {
        self.uncounted_failures
            .with_label_values(&[name, class, disposition.as_label()])
            .inc();
    }
}

lazy_static! {
    /// Process-wide breaker metrics
    pub static ref CIRCUIT_BREAKER_METRICS: CircuitBreakerMetrics = CircuitBreakerMetrics::new();
}

/// Register the breaker series with `registry`
pub fn init_circuit_breaker_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    let metrics = &*CIRCUIT_BREAKER_METRICS;
    registry.register(Box::new(metrics.state.clone()))?;
    registry.register(Box::new(metrics.admissions.clone()))?;
    registry.register(Box::new(metrics.rejections.clone()))?;
    registry.register(Box::new(metrics.successes.clone()))?;
    registry.register(Box::new(metrics.failed_calls.clone()))?;
    registry.register(Box::new(metrics.uncounted_failures.clone()))?;
    registry.register(Box::new(metrics.dropped_trials.clone()))?;
    registry.register(Box::new(metrics.call_duration.clone()))?;
    registry.register(Box::new(metrics.state_transitions.clone()))?;

    tracing::info!("Circuit breaker metrics initialized");
    Ok(())
}
