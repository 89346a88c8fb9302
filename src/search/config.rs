//! Search configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{SearchError, SearchResult};
use crate::models::MAX_PAGE_SIZE;

/// Search service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Largest page size a request may ask for
    pub max_page_size: u32,

    /// Deadline for a single store call, applied per attempt
    pub request_timeout_ms: u64,

    /// Serve an empty result with an error message instead of failing when
    /// the store is unavailable
    pub degrade_on_backend_failure: bool,

    /// Free-text fields with optional `^boost` suffix
    pub text_fields: Vec<String>,

    pub fuzziness: String,

    pub highlight: HighlightConfig,

    pub more_like_this: MoreLikeThisConfig,

    pub scoring: ScoringConfig,

    pub aggregations: AggregationConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_page_size: MAX_PAGE_SIZE,
            request_timeout_ms: 5_000,
            degrade_on_backend_failure: true,
            text_fields: [
                "description^3",
                "search_tags^2",
                "enriched_search_text^1.5",
                "address.street",
                "address.city",
                "neighborhood.name^1.5",
                "features^1.5",
                "amenities",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            fuzziness: "AUTO".to_string(),
            highlight: HighlightConfig::default(),
            more_like_this: MoreLikeThisConfig::default(),
            scoring: ScoringConfig::default(),
            aggregations: AggregationConfig::default(),
        }
    }
}

impl SearchConfig {
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::new()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> SearchResult<()> {
        if self.max_page_size == 0 || self.max_page_size > MAX_PAGE_SIZE {
            return Err(SearchError::Configuration(format!(
                "max_page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.max_page_size
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(SearchError::Configuration(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.text_fields.is_empty() {
            return Err(SearchError::Configuration(
                "text_fields must not be empty".to_string(),
            ));
        }
        if self.more_like_this.fields.is_empty() {
            return Err(SearchError::Configuration(
                "more_like_this.fields must not be empty".to_string(),
            ));
        }
        if self.aggregations.terms_size == 0 {
            return Err(SearchError::Configuration(
                "aggregations.terms_size must be greater than 0".to_string(),
            ));
        }
        let interval = self.aggregations.price_histogram_interval;
        if interval.is_nan() || interval <= 0.0 {
            return Err(SearchError::Configuration(
                "aggregations.price_histogram_interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Highlighting settings for text-driven modes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub fields: Vec<String>,
    pub pre_tag: String,
    pub post_tag: String,
    pub fragment_size: u32,
    pub number_of_fragments: u32,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            fields: ["description", "features", "amenities", "neighborhood.name"]
                .into_iter()
                .map(String::from)
                .collect(),
            pre_tag: "<em>".to_string(),
            post_tag: "</em>".to_string(),
            fragment_size: 150,
            number_of_fragments: 3,
        }
    }
}

/// Similarity search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoreLikeThisConfig {
    pub fields: Vec<String>,
    pub min_term_freq: u32,
    pub min_doc_freq: u32,
    pub max_query_terms: u32,
}

impl Default for MoreLikeThisConfig {
    fn default() -> Self {
        Self {
            fields: ["description", "features", "amenities", "enriched_search_text"]
                .into_iter()
                .map(String::from)
                .collect(),
            min_term_freq: 1,
            min_doc_freq: 1,
            max_query_terms: 25,
        }
    }
}

/// Weights for the enrichment-aware ranking modes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Neighborhood desirability field fed through `log1p`
    pub desirability_field: String,
    pub wikipedia_field: String,
    pub wikipedia_weight: f64,
    /// Nearby points of interest at or above this significance earn `poi_weight`
    pub poi_significance_threshold: f64,
    pub poi_weight: f64,
    /// Boost on the mode's domain score range clause
    pub domain_score_boost: f64,
    /// Lower bound of that range clause
    pub domain_score_floor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            desirability_field: "neighborhood.desirability_score".to_string(),
            wikipedia_field: "wikipedia_correlations".to_string(),
            wikipedia_weight: 1.2,
            poi_significance_threshold: 0.7,
            poi_weight: 1.5,
            domain_score_boost: 2.0,
            domain_score_floor: 0.5,
        }
    }
}

/// Facet sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Buckets returned per terms aggregation
    pub terms_size: u32,
    pub price_histogram_interval: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            terms_size: 20,
            price_histogram_interval: 100_000.0,
        }
    }
}

/// Builder for SearchConfig
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    pub fn max_page_size(mut self, size: u32) -> Self {
        self.config.max_page_size = size;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn degrade_on_backend_failure(mut self, enabled: bool) -> Self {
        self.config.degrade_on_backend_failure = enabled;
        self
    }

    pub fn text_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.text_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn fuzziness(mut self, fuzziness: impl Into<String>) -> Self {
        self.config.fuzziness = fuzziness.into();
        self
    }

    pub fn highlight(mut self, highlight: HighlightConfig) -> Self {
        self.config.highlight = highlight;
        self
    }

    pub fn scoring(mut self, scoring: ScoringConfig) -> Self {
        self.config.scoring = scoring;
        self
    }

    pub fn aggregations(mut self, aggregations: AggregationConfig) -> Self {
        self.config.aggregations = aggregations;
        self
    }

    pub fn build(self) -> SearchResult<SearchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for SearchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
