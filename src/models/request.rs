use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use validator::Validate;

use super::aggregation::AggregationName;
use super::filters::SearchFilters;
use super::geo::GeoSearchParams;
use crate::search::{SearchError, SearchResult};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Search strategy selected by the caller
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Text,
    Filter,
    Geo,
    Similar,
    Lifestyle,
    PoiProximity,
    Cultural,
    Investment,
}

impl SearchMode {
    /// Parse a mode name; unknown names are a configuration error
    pub fn parse(name: &str) -> SearchResult<Self> {
        Self::from_str(name.trim()).map_err(|_| SearchError::UnsupportedMode(name.to_string()))
    }

    /// Composite ranking modes over enrichment data
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            SearchMode::Lifestyle
                | SearchMode::PoiProximity
                | SearchMode::Cultural
                | SearchMode::Investment
        )
    }

    /// Modes that cannot run without query text
    pub fn requires_query(&self) -> bool {
        matches!(
            self,
            SearchMode::Text | SearchMode::Lifestyle | SearchMode::PoiProximity
        )
    }
}

/// Caller-selected ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Relevance,
    PriceAsc,
    PriceDesc,
    Newest,
    BedroomsDesc,
    SizeDesc,
}

fn default_page() -> u32 {
    1
}

fn default_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_true() -> bool {
    true
}

/// A structured, multi-modal property search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[serde(default)]
    pub mode: SearchMode,

    /// Free text, required for text-driven modes
    #[serde(default)]
    pub query: Option<String>,

    #[serde(default)]
    pub filters: Option<SearchFilters>,

    #[serde(default)]
    #[validate(nested)]
    pub geo: Option<GeoSearchParams>,

    /// Source listing for similarity search
    #[serde(default)]
    pub similar_to_id: Option<String>,

    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: u32,

    #[serde(default = "default_size")]
    #[validate(range(min = 1, max = 100))]
    pub size: u32,

    #[serde(default)]
    pub sort: SortOrder,

    #[serde(default = "default_true")]
    pub include_highlights: bool,

    #[serde(default)]
    pub include_aggregations: bool,

    /// Explicit aggregation subset; all standard aggregations when absent
    #[serde(default)]
    pub aggregations: Option<Vec<AggregationName>>,
}

impl SearchRequest {
    /// Create a request for the given mode with default pagination
    pub fn new(mode: SearchMode) -> Self {
        Self {
            mode,
            query: None,
            filters: None,
            geo: None,
            similar_to_id: None,
            page: default_page(),
            size: default_size(),
            sort: SortOrder::default(),
            include_highlights: true,
            include_aggregations: false,
            aggregations: None,
        }
    }

    /// Free-text search
    pub fn text(query: impl Into<String>) -> Self {
        Self::new(SearchMode::Text).with_query(query)
    }

    /// Pure structured filtering
    pub fn filter(filters: SearchFilters) -> Self {
        Self::new(SearchMode::Filter).with_filters(filters)
    }

    /// Radius search
    pub fn geo(params: GeoSearchParams) -> Self {
        let mut request = Self::new(SearchMode::Geo);
        request.geo = Some(params);
        request
    }

    /// "More like this" search seeded by an existing listing
    pub fn similar(listing_id: impl Into<String>) -> Self {
        let mut request = Self::new(SearchMode::Similar);
        request.similar_to_id = Some(listing_id.into());
        request
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_page(mut self, page: u32, size: u32) -> Self {
        self.page = page;
        self.size = size;
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_highlights(mut self, enabled: bool) -> Self {
        self.include_highlights = enabled;
        self
    }

    pub fn with_aggregations(mut self, enabled: bool) -> Self {
        self.include_aggregations = enabled;
        self
    }

    /// Request only the named aggregations
    pub fn with_aggregation_subset(mut self, names: Vec<AggregationName>) -> Self {
        self.include_aggregations = true;
        self.aggregations = Some(names);
        self
    }

    /// Trimmed query text, `None` when absent or blank
    pub fn query_text(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    /// Trimmed similarity source id, `None` when absent or blank
    pub fn source_id(&self) -> Option<&str> {
        self.similar_to_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Zero-based index of the first hit on the requested page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.size)
    }

    /// Validate field domains and mode-specific requirements
    pub fn ensure_valid(&self, max_page_size: u32) -> SearchResult<()> {
        self.validate()?;

        if self.size > max_page_size {
            return Err(SearchError::Validation(format!(
                "size must be at most {}, got {}",
                max_page_size, self.size
            )));
        }

        if let Some(ref filters) = self.filters {
            filters.ensure_valid()?;
        }
        if let Some(ref geo) = self.geo {
            geo.ensure_valid()?;
        }

        if self.mode.requires_query() && self.query_text().is_none() {
            return Err(SearchError::Validation(format!(
                "query text is required for {} search",
                self.mode
            )));
        }

        match self.mode {
            SearchMode::Geo if self.geo.is_none() => Err(SearchError::Validation(
                "geo parameters are required for geo search".to_string(),
            )),
            SearchMode::Similar if self.source_id().is_none() => Err(SearchError::Validation(
                "similar_to_id is required for similar search".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
