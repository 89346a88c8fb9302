//! Prometheus metrics for the search gateway.
//!
//! Search-level metrics live here; circuit breaker metrics are defined in
//! [`crate::circuit_breaker`] and registered together by [`init_metrics`].
//!
//! # Example
//! ```no_run
//! use property_search_gateway::metrics::{self, SEARCH_REQUESTS_TOTAL};
//!
//! metrics::init_metrics(&metrics::PROMETHEUS_REGISTRY).unwrap();
//! SEARCH_REQUESTS_TOTAL.with_label_values(&["text", "ok"]).inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};

use crate::circuit_breaker::init_circuit_breaker_metrics;

lazy_static! {
    /// Process-wide registry used by the binary
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Search requests by mode and outcome
    ///
    /// Labels: mode, outcome (ok, degraded, error)
    pub static ref SEARCH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_requests_total", "Total number of search requests")
            .namespace("property_search"),
        &["mode", "outcome"]
    ).expect("Failed to create SEARCH_REQUESTS_TOTAL metric");

    /// End-to-end search latency in seconds
    ///
    /// Labels: mode
    pub static ref SEARCH_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "search_request_duration_seconds",
            "Search request duration in seconds"
        )
        .namespace("property_search")
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["mode"]
    ).expect("Failed to create SEARCH_REQUEST_DURATION_SECONDS metric");

    /// Zero-result responses served because the backend failed
    ///
    /// Labels: mode, reason
    pub static ref SEARCH_DEGRADED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_degraded_total", "Total number of degraded search responses")
            .namespace("property_search"),
        &["mode", "reason"]
    ).expect("Failed to create SEARCH_DEGRADED_TOTAL metric");

    /// Hits dropped because their source document could not be mapped
    pub static ref SEARCH_DROPPED_HITS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_dropped_hits_total", "Total number of hits dropped as corrupt")
            .namespace("property_search"),
        &["mode"]
    ).expect("Failed to create SEARCH_DROPPED_HITS_TOTAL metric");

    /// Aggregations omitted because their payload was malformed
    ///
    /// Labels: aggregation
    pub static ref AGGREGATION_PARSE_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(
            "aggregation_parse_errors_total",
            "Total number of aggregation results that failed to parse"
        )
        .namespace("property_search"),
        &["aggregation"]
    ).expect("Failed to create AGGREGATION_PARSE_ERRORS_TOTAL metric");

    /// Retries scheduled after a transient failure
    ///
    /// Labels: operation
    pub static ref RETRY_ATTEMPTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("retry_attempts_total", "Total number of retried store calls")
            .namespace("property_search"),
        &["operation"]
    ).expect("Failed to create RETRY_ATTEMPTS_TOTAL metric");
}

/// Register every gateway metric with `registry`.
///
/// # Errors
/// Fails if a metric is already registered with the same registry.
pub fn init_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(SEARCH_REQUESTS_TOTAL.clone()))?;
    registry.register(Box::new(SEARCH_REQUEST_DURATION_SECONDS.clone()))?;
    registry.register(Box::new(SEARCH_DEGRADED_TOTAL.clone()))?;
    registry.register(Box::new(SEARCH_DROPPED_HITS_TOTAL.clone()))?;
    registry.register(Box::new(AGGREGATION_PARSE_ERRORS_TOTAL.clone()))?;
    registry.register(Box::new(RETRY_ATTEMPTS_TOTAL.clone()))?;

    init_circuit_breaker_metrics(registry)?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Encode `registry` in the Prometheus text exposition format
pub fn gather_metrics(registry: &Registry) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
