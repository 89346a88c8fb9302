//! Search orchestration: validation, query building, resilient execution and
//! response assembly.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::builder::QueryBuilder;
use super::config::SearchConfig;
use super::error::{SearchError, SearchResult};
use super::query::SearchBody;
use super::results::assemble_response;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerState, CircuitBreakerStats};
use crate::metrics::{SEARCH_DEGRADED_TOTAL, SEARCH_REQUESTS_TOTAL, SEARCH_REQUEST_DURATION_SECONDS};
use crate::models::{PropertyDocument, SearchMode, SearchRequest, SearchResponse};
use crate::retry::{Cancellation, RetryHandler};
use crate::store::{DocumentStore, GetOutcome, RawSearchResponse, StoreError, StoreResult};

/// Multi-modal property search over a [`DocumentStore`].
///
/// Every store call runs as `breaker(retry(timeout(call)))`: the circuit is
/// consulted once per logical call, retries happen inside it, and each
/// attempt has its own deadline.
pub struct SearchService {
    store: Arc<dyn DocumentStore>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryHandler,
    builder: QueryBuilder,
    config: SearchConfig,
}

impl SearchService {
    /// Create a search service
    pub fn new(
        store: Arc<dyn DocumentStore>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryHandler,
        config: SearchConfig,
    ) -> SearchResult<Self> {
        config.validate()?;
        let builder = QueryBuilder::new(config.clone(), store.index_name());

        info!(
            store = store.name(),
            index = store.index_name(),
            circuit = breaker.name(),
            "Search service initialized"
        );

        Ok(Self {
            store,
            breaker,
            retry,
            builder,
            config,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn query_builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Run a search to completion
    pub async fn search(&self, request: SearchRequest) -> SearchResult<SearchResponse> {
        self.search_with_cancellation(request, &Cancellation::new())
            .await
    }

    /// Run a search that stops as soon as `cancellation` fires
    pub async fn search_with_cancellation(
        &self,
        request: SearchRequest,
        cancellation: &Cancellation,
    ) -> SearchResult<SearchResponse> {
        let started = Instant::now();
        let mode = request.mode.to_string();

        let result = self.execute_search(request, cancellation, started).await;

        let outcome = match &result {
            Ok(response) if response.is_degraded() => "degraded",
            Ok(_) => "ok",
            Err(_) => "error",
        };
        SEARCH_REQUESTS_TOTAL
            .with_label_values(&[&mode, outcome])
            .inc();
        SEARCH_REQUEST_DURATION_SECONDS
            .with_label_values(&[&mode])
            .observe(started.elapsed().as_secs_f64());

        if let Err(ref e) = result {
            warn!(mode = %mode, error = %e, kind = e.kind(), "Search failed");
        }

        result
    }

    async fn execute_search(
        &self,
        request: SearchRequest,
        cancellation: &Cancellation,
        started: Instant,
    ) -> SearchResult<SearchResponse> {
        request.ensure_valid(self.config.max_page_size)?;

        debug!(
            mode = %request.mode,
            page = request.page,
            size = request.size,
            "Executing search"
        );

        match self.fetch(&request, cancellation).await {
            Ok((body, raw)) => {
                let took_ms = raw.took_ms;
                let response = assemble_response(request, &body, raw, elapsed_ms(started));
                info!(
                    mode = %response.request.mode,
                    page = response.page,
                    size = response.size,
                    total = response.total,
                    hits = response.hits.len(),
                    took_ms = took_ms,
                    execution_time_ms = response.execution_time_ms,
                    "Search completed"
                );
                Ok(response)
            }
            Err(e) if self.config.degrade_on_backend_failure && e.is_degradable() => {
                let mode = request.mode.to_string();
                warn!(mode = %mode, error = %e, "Serving degraded search response");
                SEARCH_DEGRADED_TOTAL
                    .with_label_values(&[&mode, e.kind()])
                    .inc();
                Ok(SearchResponse::degraded(
                    request,
                    e.to_string(),
                    elapsed_ms(started),
                ))
            }
            Err(e) => Err(e),
        }
    }

    /// Everything that talks to the store for one search
    async fn fetch(
        &self,
        request: &SearchRequest,
        cancellation: &Cancellation,
    ) -> SearchResult<(SearchBody, RawSearchResponse)> {
        if request.mode == SearchMode::Similar {
            self.resolve_source(request, cancellation).await?;
        }

        let body = self.builder.build(request)?;
        let raw = self
            .call_store("search", cancellation, || self.store.search(&body))
            .await?;
        Ok((body, raw))
    }

    /// Similar-mode searches fail before searching when the source is unknown
    async fn resolve_source(
        &self,
        request: &SearchRequest,
        cancellation: &Cancellation,
    ) -> SearchResult<()> {
        let id = request.source_id().ok_or_else(|| {
            SearchError::Validation("similar_to_id is required for similar search".to_string())
        })?;

        match self
            .call_store("get", cancellation, || self.store.get(id))
            .await?
        {
            GetOutcome::Found(_) => Ok(()),
            GetOutcome::NotFound => {
                info!(similar_to_id = id, "Similarity source not found");
                Err(SearchError::SourceNotFound(id.to_string()))
            }
        }
    }

    /// Number of documents matching the request's query
    pub async fn count(&self, request: &SearchRequest) -> SearchResult<u64> {
        request.ensure_valid(self.config.max_page_size)?;
        let cancellation = Cancellation::new();

        if request.mode == SearchMode::Similar {
            self.resolve_source(request, &cancellation).await?;
        }

        let query = self.builder.build_query(request);
        let count = self
            .call_store("count", &cancellation, || self.store.count(&query))
            .await?;

        debug!(mode = %request.mode, count = count, "Count completed");
        Ok(count)
    }

    /// Fetch a single listing by id
    pub async fn get_property(&self, id: &str) -> SearchResult<Option<PropertyDocument>> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SearchError::Validation(
                "property id must not be empty".to_string(),
            ));
        }

        let cancellation = Cancellation::new();
        match self
            .call_store("get", &cancellation, || self.store.get(id))
            .await?
        {
            GetOutcome::Found(document) => serde_json::from_value(document.source)
                .map(Some)
                .map_err(|e| SearchError::ResultProcessing(format!("document '{}': {}", id, e))),
            GetOutcome::NotFound => Ok(None),
        }
    }

    pub fn circuit_state(&self) -> CircuitBreakerState {
        self.breaker.state()
    }

    pub fn circuit_stats(&self) -> CircuitBreakerStats {
        self.breaker.stats()
    }

    /// Run one logical store call through breaker, retry and per-attempt timeout
    async fn call_store<T, F, Fut>(
        &self,
        operation: &str,
        cancellation: &Cancellation,
        call: F,
    ) -> SearchResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let timeout = self.config.request_timeout();

        self.breaker
            .call(|| {
                self.retry.run(operation, cancellation, || {
                    let attempt = call();
                    async move {
                        tokio::time::timeout(timeout, attempt)
                            .await
                            .unwrap_or_else(|_| {
                                Err(StoreError::Timeout(format!(
                                    "{} exceeded {}ms",
                                    operation,
                                    timeout.as_millis()
                                )))
                            })
                    }
                })
            })
            .await
            .map_err(SearchError::from)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
