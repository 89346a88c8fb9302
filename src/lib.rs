//! Resilient multi-modal property search over an Elasticsearch-compatible
//! index.
//!
//! A [`search::SearchService`] turns a [`models::SearchRequest`] into a
//! backend query, runs it through a [`circuit_breaker::CircuitBreaker`] and a
//! [`retry::RetryHandler`], and maps the answer into a typed
//! [`models::SearchResponse`].

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod retry;
pub mod search;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};
pub use models::{SearchMode, SearchRequest, SearchResponse};
pub use search::{SearchError, SearchResult, SearchService};
