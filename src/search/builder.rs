//! Compiles a [`SearchRequest`] into a [`SearchBody`] per search mode.

use serde_json::Value;

use super::aggregations::AggregationBuilder;
use super::config::SearchConfig;
use super::error::{SearchError, SearchResult};
use super::query::{
    BoolQuery, HighlightSpec, LikeDocument, Query, SearchBody, SortClause, SortDirection,
};
use super::scoring::{composite_clauses, domain_score_field, with_enrichment_scoring};
use crate::models::{SearchFilters, SearchMode, SearchRequest, SortOrder};

const LOCATION_FIELD: &str = "address.location";

/// Stateless query compiler; equal requests always yield equal bodies
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    config: SearchConfig,
    index: String,
    aggregations: AggregationBuilder,
}

impl QueryBuilder {
    /// `index` is referenced by similarity queries
    pub fn new(config: SearchConfig, index: impl Into<String>) -> Self {
        let aggregations = AggregationBuilder::new(config.aggregations.clone());
        Self {
            config,
            index: index.into(),
            aggregations,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Full request body: query, sort, pagination, highlight and aggregations
    pub fn build(&self, request: &SearchRequest) -> SearchResult<SearchBody> {
        match request.mode {
            SearchMode::Geo if request.geo.is_none() => {
                return Err(SearchError::Validation(
                    "geo parameters are required for geo search".to_string(),
                ));
            }
            SearchMode::Similar if request.source_id().is_none() => {
                return Err(SearchError::Validation(
                    "similar_to_id is required for similar search".to_string(),
                ));
            }
            _ => {}
        }

        let mut body = SearchBody::new(self.build_query(request));
        body.sort = self.build_sort(request);
        body.from = request.offset();
        body.size = request.size;

        if request.include_highlights && request.query_text().is_some() {
            body.highlight = Some(self.highlight());
        }

        if request.include_aggregations {
            body.aggregations = match &request.aggregations {
                Some(names) => self.aggregations.build_subset(names),
                None => self.aggregations.build_standard(),
            };
        }

        Ok(body)
    }

    /// Just the query expression for the request's mode
    pub fn build_query(&self, request: &SearchRequest) -> Query {
        let mut filters = Vec::new();
        if let Some(request_filters) = &request.filters {
            filters.extend(filter_clauses(request_filters));
        }

        match request.mode {
            SearchMode::Text => {
                let mut query = BoolQuery::new().filters(filters);
                if let Some(text) = request.query_text() {
                    query = query.must(self.text_match(text));
                }
                query.into_query()
            }
            SearchMode::Filter => BoolQuery::new().filters(filters).into_query(),
            SearchMode::Geo => {
                let mut query = BoolQuery::new();
                if let Some(geo) = &request.geo {
                    query = query.filter(Query::GeoDistance {
                        field: LOCATION_FIELD.to_string(),
                        center: geo.center,
                        distance: geo.distance(),
                    });
                    if let Some(geo_filters) = &geo.filters {
                        filters.extend(filter_clauses(geo_filters));
                    }
                }
                query.filters(filters).into_query()
            }
            SearchMode::Similar => {
                let mut query = BoolQuery::new();
                if let Some(id) = request.source_id() {
                    query = query.must(self.more_like_this(id));
                }
                query.filters(filters).into_query()
            }
            SearchMode::Lifestyle
            | SearchMode::PoiProximity
            | SearchMode::Cultural
            | SearchMode::Investment => {
                let clauses =
                    composite_clauses(request.mode, request.query_text(), &self.config.scoring);
                let query = clauses.filters(filters).into_query();
                with_enrichment_scoring(query, &self.config.scoring)
            }
        }
    }

    fn text_match(&self, text: &str) -> Query {
        Query::MultiMatch {
            query: text.to_string(),
            fields: self.config.text_fields.clone(),
            fuzziness: Some(self.config.fuzziness.clone()),
            boost: None,
        }
    }

    fn more_like_this(&self, id: &str) -> Query {
        let mlt = &self.config.more_like_this;
        Query::MoreLikeThis {
            fields: mlt.fields.clone(),
            like: vec![LikeDocument {
                index: self.index.clone(),
                id: id.to_string(),
            }],
            min_term_freq: mlt.min_term_freq,
            min_doc_freq: mlt.min_doc_freq,
            max_query_terms: mlt.max_query_terms,
        }
    }

    fn highlight(&self) -> HighlightSpec {
        let highlight = &self.config.highlight;
        HighlightSpec {
            fields: highlight.fields.clone(),
            pre_tag: highlight.pre_tag.clone(),
            post_tag: highlight.post_tag.clone(),
            fragment_size: highlight.fragment_size,
            number_of_fragments: highlight.number_of_fragments,
        }
    }

    /// Mode's primary key first, then the caller's explicit order
    fn build_sort(&self, request: &SearchRequest) -> Vec<SortClause> {
        let explicit = explicit_sort(request.sort);
        let mut sort = Vec::new();

        match request.mode {
            SearchMode::Geo => {
                if let Some(geo) = &request.geo {
                    sort.push(SortClause::GeoDistance {
                        field: LOCATION_FIELD.to_string(),
                        center: geo.center,
                        unit: geo.unit,
                        direction: SortDirection::Asc,
                    });
                }
                sort.extend(explicit);
            }
            mode if mode.is_composite() => {
                if let Some(field) = domain_score_field(mode) {
                    sort.push(SortClause::field(field, SortDirection::Desc));
                }
                sort.extend(explicit);
                sort.push(SortClause::Score);
            }
            SearchMode::Filter => sort.extend(explicit),
            _ => {
                sort.extend(explicit);
                sort.push(SortClause::Score);
            }
        }

        sort
    }
}

fn explicit_sort(order: SortOrder) -> Option<SortClause> {
    let (field, direction) = match order {
        SortOrder::Relevance => return None,
        SortOrder::PriceAsc => ("price", SortDirection::Asc),
        SortOrder::PriceDesc => ("price", SortDirection::Desc),
        SortOrder::Newest => ("listing_date", SortDirection::Desc),
        SortOrder::BedroomsDesc => ("bedrooms", SortDirection::Desc),
        SortOrder::SizeDesc => ("square_feet", SortDirection::Desc),
    };
    Some(SortClause::field(field, direction))
}

fn push_range<T: Into<Value>>(clauses: &mut Vec<Query>, field: &str, min: Option<T>, max: Option<T>) {
    if let Some(min) = min {
        clauses.push(Query::at_least(field, min));
    }
    if let Some(max) = max {
        clauses.push(Query::at_most(field, max));
    }
}

/// Filter-context clauses, one per set constraint
pub fn filter_clauses(filters: &SearchFilters) -> Vec<Query> {
    let mut clauses = Vec::new();

    push_range(&mut clauses, "price", filters.min_price, filters.max_price);
    push_range(&mut clauses, "bedrooms", filters.min_bedrooms, filters.max_bedrooms);
    push_range(&mut clauses, "bathrooms", filters.min_bathrooms, filters.max_bathrooms);
    push_range(
        &mut clauses,
        "square_feet",
        filters.min_square_feet,
        filters.max_square_feet,
    );

    if !filters.property_types.is_empty() {
        clauses.push(Query::terms("property_type", filters.property_types.iter().cloned()));
    }
    if let Some(status) = &filters.status {
        clauses.push(Query::term("status", status.clone()));
    }
    if !filters.cities.is_empty() {
        clauses.push(Query::terms("address.city", filters.cities.iter().cloned()));
    }
    if !filters.states.is_empty() {
        clauses.push(Query::terms("address.state", filters.states.iter().cloned()));
    }
    if !filters.zip_codes.is_empty() {
        clauses.push(Query::terms("address.zip_code", filters.zip_codes.iter().cloned()));
    }

    // every listed feature and amenity must be present
    for feature in &filters.features {
        clauses.push(Query::term("features", feature.clone()));
    }
    for amenity in &filters.amenities {
        clauses.push(Query::term("amenities", amenity.clone()));
    }

    if let Some(spaces) = filters.min_parking_spaces {
        clauses.push(Query::at_least("parking.spaces", spaces));
    }
    if filters.garage_required {
        clauses.push(Query::term("parking.type", "garage"));
    }

    push_range(
        &mut clauses,
        "listing_date",
        filters.listed_after.map(|d| d.to_string()),
        filters.listed_before.map(|d| d.to_string()),
    );
    push_range(
        &mut clauses,
        "year_built",
        filters.min_year_built,
        filters.max_year_built,
    );
    if let Some(fee) = filters.max_hoa_fee {
        clauses.push(Query::at_most("hoa_fee", fee));
    }

    clauses
}
