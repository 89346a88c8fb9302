//! HTTP client for Elasticsearch-compatible clusters

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{DocumentStore, GetOutcome, RawDocument, RawHit, RawSearchResponse};
use super::error::{StoreError, StoreResult};
use crate::error::{AppError, Result};
use crate::search::{count_body, Query, SearchBody};

/// Connection settings for the property index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticsearchConfig {
    /// Base URL, e.g. `http://localhost:9200`
    pub url: String,
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Client-level deadline for a whole HTTP exchange
    pub timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: "properties".to_string(),
            username: None,
            password: None,
            timeout_ms: 10_000,
            connect_timeout_ms: 2_000,
        }
    }
}

impl ElasticsearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        parse_base_url(&self.url)?;
        if self.index.trim().is_empty() {
            return Err(AppError::Configuration(
                "store.index must not be empty".to_string(),
            ));
        }
        if self.timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(AppError::Configuration(
                "store timeouts must be greater than 0".to_string(),
            ));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(AppError::Configuration(
                "store.password requires store.username".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_base_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| AppError::Configuration(format!("Invalid store url '{}': {}", url, e)))?;
    if parsed.cannot_be_a_base() {
        return Err(AppError::Configuration(format!(
            "Store url '{}' cannot be used as a base",
            url
        )));
    }
    Ok(parsed)
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    took: u64,
    hits: HitsEnvelope,
    #[serde(default)]
    aggregations: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<HitEnvelope>,
}

/// `{"value": n, "relation": "eq"}` on 7.x and later, a bare number before
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Object { value: u64 },
    Count(u64),
}

impl TotalHits {
    fn value(&self) -> u64 {
        match self {
            TotalHits::Object { value } | TotalHits::Count(value) => *value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HitEnvelope {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Value,
    #[serde(default)]
    sort: Vec<Value>,
    #[serde(default)]
    highlight: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CountEnvelope {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct GetEnvelope {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Value,
}

fn parse_search_response(body: &str) -> StoreResult<RawSearchResponse> {
    let envelope: SearchEnvelope = serde_json::from_str(body)?;
    let total = envelope
        .hits
        .total
        .as_ref()
        .map(TotalHits::value)
        .unwrap_or(envelope.hits.hits.len() as u64);

    let hits = envelope
        .hits
        .hits
        .into_iter()
        .map(|hit| RawHit {
            id: hit.id,
            score: hit.score,
            source: hit.source,
            sort: hit.sort,
            highlight: hit.highlight,
        })
        .collect();

    Ok(RawSearchResponse {
        hits,
        total,
        aggregations: envelope.aggregations,
        took_ms: envelope.took,
    })
}

/// [`DocumentStore`] backed by an Elasticsearch or OpenSearch index
#[derive(Debug, Clone)]
pub struct ElasticsearchStore {
    client: Client,
    base_url: Url,
    config: ElasticsearchConfig,
}

impl ElasticsearchStore {
    /// Create a store client
    pub fn new(config: ElasticsearchConfig) -> Result<Self> {
        config.validate()?;
        let base_url = parse_base_url(&config.url)?;

        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }

    fn endpoint(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::BadRequest(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .push(&self.config.index)
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.username {
            Some(username) => request.basic_auth(username, self.config.password.as_ref()),
            None => request,
        }
    }

    /// Send a request and return status plus body text
    async fn execute(&self, request: RequestBuilder) -> StoreResult<(StatusCode, String)> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    fn index_missing(&self) -> StoreError {
        StoreError::BadRequest(format!("index '{}' does not exist", self.config.index))
    }
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    fn name(&self) -> &str {
        "elasticsearch"
    }

    fn index_name(&self) -> &str {
        &self.config.index
    }

    async fn search(&self, body: &SearchBody) -> StoreResult<RawSearchResponse> {
        let url = self.endpoint(&["_search"])?;
        let started = Instant::now();

        let (status, text) = self
            .execute(self.client.post(url).json(&body.to_json()))
            .await?;

        match status {
            StatusCode::NOT_FOUND => return Err(self.index_missing()),
            s if !s.is_success() => {
                warn!(
                    index = %self.config.index,
                    status = s.as_u16(),
                    "Search request rejected by store"
                );
                return Err(StoreError::from_status(s.as_u16(), &text));
            }
            _ => {}
        }

        let response = parse_search_response(&text)?;
        debug!(
            index = %self.config.index,
            hits = response.hits.len(),
            total = response.total,
            took_ms = response.took_ms,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Store search completed"
        );
        Ok(response)
    }

    async fn count(&self, query: &Query) -> StoreResult<u64> {
        let url = self.endpoint(&["_count"])?;
        let (status, text) = self
            .execute(self.client.post(url).json(&count_body(query)))
            .await?;

        match status {
            StatusCode::NOT_FOUND => Err(self.index_missing()),
            s if !s.is_success() => Err(StoreError::from_status(s.as_u16(), &text)),
            _ => {
                let envelope: CountEnvelope = serde_json::from_str(&text)?;
                debug!(index = %self.config.index, count = envelope.count, "Store count completed");
                Ok(envelope.count)
            }
        }
    }

    async fn get(&self, id: &str) -> StoreResult<GetOutcome> {
        let url = self.endpoint(&["_doc", id])?;
        let (status, text) = self.execute(self.client.get(url)).await?;

        match status {
            StatusCode::NOT_FOUND => Ok(GetOutcome::NotFound),
            s if !s.is_success() => Err(StoreError::from_status(s.as_u16(), &text)),
            _ => {
                let envelope: GetEnvelope = serde_json::from_str(&text)?;
                if !envelope.found {
                    return Ok(GetOutcome::NotFound);
                }
                Ok(GetOutcome::Found(RawDocument {
                    id: envelope.id,
                    source: envelope.source,
                }))
            }
        }
    }
}
