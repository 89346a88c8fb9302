use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::aggregation::{Aggregation, AggregationName};
use super::property::PropertyDocument;
use super::request::SearchRequest;

/// A single matched listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyHit {
    /// Backend document id
    pub id: String,

    pub property: PropertyDocument,

    /// Relevance score; absent when the backend sorted without scoring
    pub score: Option<f64>,

    /// Distance from the search center in the request's unit (geo mode only)
    pub distance: Option<f64>,

    /// Field name to ordered highlighted fragments
    #[serde(default)]
    pub highlights: HashMap<String, Vec<String>>,
}

/// Paginated, typed search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<PropertyHit>,

    /// Total number of matches before pagination
    pub total: u64,

    pub page: u32,
    pub size: u32,

    /// Always at least 1, even when nothing matched
    pub total_pages: u32,

    pub has_next: bool,
    pub has_previous: bool,

    pub execution_time_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<BTreeMap<AggregationName, Aggregation>>,

    pub request: SearchRequest,

    /// Set only on degraded responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    /// Zero-result response carrying the backend failure
    pub fn degraded(request: SearchRequest, error: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            hits: Vec::new(),
            total: 0,
            page: request.page,
            size: request.size,
            total_pages: 1,
            has_next: false,
            has_previous: request.page > 1,
            execution_time_ms,
            aggregations: None,
            request,
            error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// `max(1, ceil(total / size))`
pub fn total_pages(total: u64, size: u32) -> u32 {
    if size == 0 {
        return 1;
    }
    let pages = total.div_ceil(u64::from(size)).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_never_zero() {
        assert_eq!(total_pages(0, 20), 1);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(100, 7), 15);
    }

    #[test]
    fn test_degraded_response() {
        let request = SearchRequest::text("cabin").with_page(3, 10);
        let response = SearchResponse::degraded(request, "backend unavailable", 12);

        assert!(response.is_degraded());
        assert!(response.hits.is_empty());
        assert_eq!(response.total_pages, 1);
        assert!(!response.has_next);
        assert_eq!(response.page, 3);
    }
}
