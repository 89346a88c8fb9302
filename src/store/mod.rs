//! Document store abstraction over the property index.
//!
//! [`DocumentStore`] is the only seam between the search service and the
//! backend. [`ElasticsearchStore`] talks to an Elasticsearch or OpenSearch
//! cluster over HTTP; tests substitute scripted in-memory stores.

mod elasticsearch;
mod error;

pub use elasticsearch::{ElasticsearchConfig, ElasticsearchStore};
pub use error::{StoreError, StoreResult};

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::search::{Query, SearchBody};

/// A hit as returned by the backend, before typed mapping
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub id: String,
    pub score: Option<f64>,
    pub source: Value,
    /// Sort values in the order of the request's sort keys
    pub sort: Vec<Value>,
    pub highlight: HashMap<String, Vec<String>>,
}

impl RawHit {
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            score: None,
            source,
            sort: Vec::new(),
            highlight: HashMap::new(),
        }
    }
}

/// Untyped search result page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSearchResponse {
    pub hits: Vec<RawHit>,
    pub total: u64,
    /// Aggregation payloads keyed by the requested aggregation name
    pub aggregations: Map<String, Value>,
    pub took_ms: u64,
}

/// A document fetched by id
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub id: String,
    pub source: Value,
}

/// Result of a point lookup; absence is not an error
#[derive(Debug, Clone, PartialEq)]
pub enum GetOutcome {
    Found(RawDocument),
    NotFound,
}

/// Search backend holding property documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short name used for logging and circuit naming
    fn name(&self) -> &str;

    /// Index the documents live in
    fn index_name(&self) -> &str;

    async fn search(&self, body: &SearchBody) -> StoreResult<RawSearchResponse>;

    async fn count(&self, query: &Query) -> StoreResult<u64>;

    async fn get(&self, id: &str) -> StoreResult<GetOutcome>;
}
