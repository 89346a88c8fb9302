//! Multi-modal property search over an Elasticsearch-compatible index.
//!
//! This module covers the whole request path:
//!
//! - **Query building**: text, filter, geo, similarity and the
//!   enrichment-aware composite modes compile into a [`Query`] tree
//! - **Aggregations**: price ranges, histograms, terms facets and stats
//! - **Resilient execution**: every store call goes through the circuit
//!   breaker, the retry handler and a per-attempt timeout
//! - **Result assembly**: typed hits, distances, highlights, pagination and
//!   parsed aggregations, with a degraded response when the backend fails
//!
//! # Architecture
//!
//! ```text
//! SearchRequest
//!      │  validate
//!      ▼
//! QueryBuilder ──► SearchBody (query, sort, from/size, highlight, aggs)
//!      │
//!      ▼
//! CircuitBreaker( RetryHandler( timeout( DocumentStore::search ) ) )
//!      │
//!      ▼
//! results::assemble_response ──► SearchResponse
//! ```
//!
//! # Example
//!
//! ```no_run
//! use property_search_gateway::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use property_search_gateway::models::SearchRequest;
//! use property_search_gateway::retry::{RetryConfig, RetryHandler};
//! use property_search_gateway::search::{SearchConfig, SearchService};
//! use property_search_gateway::store::{ElasticsearchConfig, ElasticsearchStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(ElasticsearchStore::new(ElasticsearchConfig::default())?);
//!     let breaker = Arc::new(CircuitBreaker::new("elasticsearch", CircuitBreakerConfig::default()));
//!     let retry = RetryHandler::new(RetryConfig::default());
//!     let search = SearchService::new(store, breaker, retry, SearchConfig::default())?;
//!
//!     let response = search.search(SearchRequest::text("mountain views")).await?;
//!     println!("Found {} listings", response.total);
//!
//!     Ok(())
//! }
//! ```

mod aggregations;
mod builder;
mod config;
mod error;
mod query;
mod results;
mod scoring;
mod service;

pub use aggregations::{AggregationBuilder, AggregationSpec, RangeBucket};
pub use builder::{filter_clauses, QueryBuilder};
pub use config::{
    AggregationConfig, HighlightConfig, MoreLikeThisConfig, ScoringConfig, SearchConfig,
    SearchConfigBuilder,
};
pub use error::{SearchError, SearchResult};
pub use query::{
    count_body, BoolQuery, BoostMode, FieldValueModifier, HighlightSpec, LikeDocument, Query,
    ScoreFunction, ScoreFunctionKind, ScoreMode, SearchBody, SortClause, SortDirection,
};
pub use results::{assemble_response, map_hits, parse_aggregations};
pub use scoring::{composite_clauses, domain_score_field, with_enrichment_scoring};
pub use service::SearchService;
