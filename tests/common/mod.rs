//! Shared helpers for the integration tests.
//!
//! [`ScriptedStore`] is an in-memory [`DocumentStore`] whose search and count
//! answers are queued up front, so tests can drive retry, timeout and circuit
//! behaviour without a live cluster.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use property_search_gateway::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use property_search_gateway::retry::{RetryConfig, RetryHandler};
use property_search_gateway::search::{Query, SearchBody, SearchConfig, SearchService};
use property_search_gateway::store::{
    DocumentStore, GetOutcome, RawDocument, RawHit, RawSearchResponse, StoreError, StoreResult,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const INDEX: &str = "properties";

#[derive(Default)]
pub struct ScriptedStore {
    searches: Mutex<VecDeque<StoreResult<RawSearchResponse>>>,
    search_fallback: Mutex<Option<StoreResult<RawSearchResponse>>>,
    counts: Mutex<VecDeque<StoreResult<u64>>>,
    documents: Mutex<HashMap<String, Value>>,
    delay: Mutex<Option<Duration>>,
    bodies: Mutex<Vec<SearchBody>>,
    search_calls: AtomicUsize,
    count_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl ScriptedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue one search answer; answers are consumed in order
    pub fn push_search(&self, result: StoreResult<RawSearchResponse>) {
        self.searches.lock().push_back(result);
    }

    /// Answer used once the queue is empty
    pub fn search_fallback(&self, result: StoreResult<RawSearchResponse>) {
        *self.search_fallback.lock() = Some(result);
    }

    pub fn push_count(&self, result: StoreResult<u64>) {
        self.counts.lock().push_back(result);
    }

    pub fn insert_document(&self, id: &str, source: Value) {
        self.documents.lock().insert(id.to_string(), source);
    }

    /// Delay every call by `delay`
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn last_body(&self) -> Option<SearchBody> {
        self.bodies.lock().last().cloned()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    fn name(&self) -> &str {
        "scripted"
    }

    fn index_name(&self) -> &str {
        INDEX
    }

    async fn search(&self, body: &SearchBody) -> StoreResult<RawSearchResponse> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.bodies.lock().push(body.clone());
        self.pause().await;

        let next = self.searches.lock().pop_front();
        match next {
            Some(result) => result,
            None => self
                .search_fallback
                .lock()
                .clone()
                .unwrap_or_else(|| Ok(RawSearchResponse::default())),
        }
    }

    async fn count(&self, _query: &Query) -> StoreResult<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.counts.lock().pop_front().unwrap_or(Ok(0))
    }

    async fn get(&self, id: &str) -> StoreResult<GetOutcome> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(match self.documents.lock().get(id) {
            Some(source) => GetOutcome::Found(RawDocument {
                id: id.to_string(),
                source: source.clone(),
            }),
            None => GetOutcome::NotFound,
        })
    }
}

/// A well-formed listing document
pub fn listing(id: &str, price: f64) -> Value {
    json!({
        "listing_id": id,
        "property_type": "single_family",
        "status": "active",
        "price": price,
        "bedrooms": 3,
        "bathrooms": 2.5,
        "square_feet": 1850,
        "description": "Mountain views and a short walk to the lifts",
        "features": ["fireplace", "deck"],
        "address": {
            "street": "12 Main St",
            "city": "Park City",
            "state": "UT",
            "zip_code": "84060",
            "location": {"lat": 40.6461, "lon": -111.4980}
        }
    })
}

pub fn hit(id: &str, price: f64) -> RawHit {
    let mut hit = RawHit::new(id, listing(id, price));
    hit.score = Some(1.0);
    hit
}

/// Search answer with one hit per id and the given total
pub fn page_of(ids: &[&str], total: u64) -> RawSearchResponse {
    RawSearchResponse {
        hits: ids
            .iter()
            .enumerate()
            .map(|(i, id)| hit(id, 400_000.0 + i as f64 * 1_000.0))
            .collect(),
        total,
        took_ms: 3,
        ..Default::default()
    }
}

pub fn transient() -> StoreError {
    StoreError::Transient("HTTP 503: overloaded".to_string())
}

/// Retries with millisecond backoff
pub fn fast_retry(max_attempts: u32) -> RetryHandler {
    RetryHandler::new(RetryConfig {
        max_attempts,
        min_wait_ms: 1,
        max_wait_ms: 5,
        multiplier: 2.0,
    })
}

pub fn breaker(threshold: u32, recovery: Duration) -> Arc<CircuitBreaker> {
    let config = CircuitBreakerConfig::builder()
        .failure_threshold(threshold)
        .recovery_timeout(recovery)
        .build()
        .expect("valid breaker config");
    Arc::new(CircuitBreaker::new("scripted-store", config))
}

pub fn service_with(
    store: Arc<ScriptedStore>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryHandler,
    config: SearchConfig,
) -> SearchService {
    SearchService::new(store, breaker, retry, config).expect("valid search config")
}

/// Service with default search config, three fast attempts and a threshold of 5
pub fn service(store: Arc<ScriptedStore>) -> SearchService {
    service_with(
        store,
        breaker(5, Duration::from_secs(30)),
        fast_retry(3),
        SearchConfig::default(),
    )
}
