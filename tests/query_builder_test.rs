// Query Builder Test Suite
// Request bodies as the backend sees them, one section per search mode

use property_search_gateway::models::{
    AggregationName, DistanceUnit, GeoPoint, GeoSearchParams, SearchFilters, SearchMode,
    SearchRequest, SortOrder,
};
use property_search_gateway::search::{QueryBuilder, SearchConfig, SearchError};
use serde_json::{json, Value};

fn builder() -> QueryBuilder {
    QueryBuilder::new(SearchConfig::default(), "properties")
}

fn body_for(request: &SearchRequest) -> Value {
    builder().build(request).unwrap().to_json()
}

fn park_city() -> GeoSearchParams {
    let center = GeoPoint::new(40.6461, -111.4980).unwrap();
    GeoSearchParams::new(center, 10.0, DistanceUnit::Kilometers).unwrap()
}

// ============================================================================
// TEXT AND FILTER MODES
// ============================================================================

#[test]
fn test_text_body_shape() {
    let request = SearchRequest::text("ski in ski out").with_page(2, 10);
    let body = body_for(&request);

    let must = &body["query"]["bool"]["must"][0]["multi_match"];
    assert_eq!(must["query"], "ski in ski out");
    assert_eq!(must["fuzziness"], "AUTO");
    assert!(must["fields"]
        .as_array()
        .unwrap()
        .contains(&json!("description^3")));

    assert_eq!(body["from"], 10);
    assert_eq!(body["size"], 10);
    assert_eq!(body["track_total_hits"], true);
    assert_eq!(body["sort"], json!([{ "_score": { "order": "desc" } }]));
    assert_eq!(body["highlight"]["pre_tags"], json!(["<em>"]));
    assert!(body.get("aggs").is_none());
}

#[test]
fn test_text_query_is_trimmed_and_highlight_optional() {
    let request = SearchRequest::text("  loft  ").with_highlights(false);
    let body = body_for(&request);

    assert_eq!(
        body["query"]["bool"]["must"][0]["multi_match"]["query"],
        "loft"
    );
    assert!(body.get("highlight").is_none());
}

#[test]
fn test_filters_become_non_scoring_clauses() {
    let filters = SearchFilters::builder()
        .price_range(Some(250_000.0), None)
        .property_types(["Condo", "townhouse"])
        .cities(["Park City"])
        .build()
        .unwrap();
    let body = body_for(&SearchRequest::filter(filters));

    let filter = body["query"]["bool"]["filter"].as_array().unwrap();
    assert!(filter.contains(&json!({ "range": { "price": { "gte": 250000.0 } } })));
    assert!(filter.contains(&json!({ "terms": { "property_type": ["condo", "townhouse"] } })));
    assert!(filter.contains(&json!({ "terms": { "address.city": ["park city"] } })));
    assert!(body["query"]["bool"].get("must").is_none());
    assert!(body.get("sort").is_none());
}

#[test]
fn test_empty_filter_search_matches_all() {
    let body = body_for(&SearchRequest::filter(SearchFilters::default()));
    assert_eq!(body["query"], json!({ "match_all": {} }));
}

#[test]
fn test_explicit_sort_orders() {
    let cases = [
        (SortOrder::PriceAsc, "price", "asc"),
        (SortOrder::PriceDesc, "price", "desc"),
        (SortOrder::Newest, "listing_date", "desc"),
        (SortOrder::BedroomsDesc, "bedrooms", "desc"),
        (SortOrder::SizeDesc, "square_feet", "desc"),
    ];

    for (order, field, direction) in cases {
        let body = body_for(&SearchRequest::text("condo").with_sort(order));
        assert_eq!(body["sort"][0][field]["order"], direction, "{:?}", order);
        assert_eq!(body["sort"][0][field]["missing"], "_last");
        assert_eq!(body["sort"][1], json!({ "_score": { "order": "desc" } }));
    }
}

// ============================================================================
// GEO AND SIMILAR MODES
// ============================================================================

#[test]
fn test_geo_body_shape() {
    let request = SearchRequest::geo(park_city()).with_sort(SortOrder::PriceAsc);
    let body = body_for(&request);

    let geo = &body["query"]["bool"]["filter"][0]["geo_distance"];
    assert_eq!(geo["distance"], "10km");
    assert_eq!(geo["address.location"]["lat"], 40.6461);

    let sort = body["sort"].as_array().unwrap();
    assert_eq!(sort.len(), 2);
    assert_eq!(sort[0]["_geo_distance"]["order"], "asc");
    assert_eq!(sort[0]["_geo_distance"]["unit"], "km");
    assert_eq!(sort[1]["price"]["order"], "asc");
}

#[test]
fn test_geo_without_text_has_no_highlight() {
    let request = SearchRequest::geo(park_city());
    let body = body_for(&request);
    assert!(body.get("highlight").is_none());
}

#[test]
fn test_similar_body_references_source() {
    let filters = SearchFilters::builder()
        .bedrooms(Some(2), None)
        .build()
        .unwrap();
    let request = SearchRequest::similar(" abc-123 ").with_filters(filters);
    let body = body_for(&request);

    let mlt = &body["query"]["bool"]["must"][0]["more_like_this"];
    assert_eq!(mlt["like"], json!([{ "_index": "properties", "_id": "abc-123" }]));
    assert_eq!(mlt["max_query_terms"], 25);
    assert_eq!(
        body["query"]["bool"]["filter"],
        json!([{ "range": { "bedrooms": { "gte": 2 } } }])
    );
}

#[test]
fn test_missing_mode_inputs_rejected() {
    let qb = builder();

    let err = qb.build(&SearchRequest::new(SearchMode::Geo)).unwrap_err();
    assert!(matches!(err, SearchError::Validation(_)));

    let err = qb.build(&SearchRequest::similar("   ")).unwrap_err();
    assert!(matches!(err, SearchError::Validation(_)));
}

// ============================================================================
// COMPOSITE MODES
// ============================================================================

#[test]
fn test_composite_modes_share_enrichment_scoring() {
    for mode in [
        SearchMode::Lifestyle,
        SearchMode::PoiProximity,
        SearchMode::Cultural,
        SearchMode::Investment,
    ] {
        let request = SearchRequest::new(mode).with_query("hiking");
        let body = body_for(&request);

        let score = &body["query"]["function_score"];
        assert_eq!(score["boost_mode"], "multiply", "{}", mode);
        assert_eq!(score["functions"].as_array().unwrap().len(), 3);
        assert_eq!(
            score["functions"][0]["field_value_factor"]["field"],
            "neighborhood.desirability_score"
        );
        assert!(score["query"]["bool"].get("minimum_should_match").is_none());
        assert!(score["query"]["bool"]["must"][0].get("match_all").is_none());
    }
}

#[test]
fn test_composite_sort_leads_with_domain_score() {
    let expected = [
        (SearchMode::Lifestyle, "neighborhood.lifestyle_score"),
        (SearchMode::PoiProximity, "location_context.location_quality_score"),
        (SearchMode::Cultural, "location_context.cultural_richness"),
        (SearchMode::Investment, "neighborhood.investment_score"),
    ];

    for (mode, field) in expected {
        let body = body_for(&SearchRequest::new(mode).with_query("views"));
        let sort = body["sort"].as_array().unwrap();
        assert_eq!(sort[0][field]["order"], "desc", "{}", mode);
        assert_eq!(sort.last().unwrap(), &json!({ "_score": { "order": "desc" } }));
    }
}

#[test]
fn test_poi_mode_searches_nested_points_of_interest() {
    let body = body_for(&SearchRequest::new(SearchMode::PoiProximity).with_query("museum"));

    let keyword = &body["query"]["function_score"]["query"]["bool"]["must"][0]["bool"];
    assert_eq!(keyword["minimum_should_match"], 1);
    let should = keyword["should"].as_array().unwrap();
    assert_eq!(should[0]["nested"]["path"], "nearby_poi");
    assert_eq!(
        should[0]["nested"]["query"]["multi_match"]["query"],
        "museum"
    );
}

#[test]
fn test_composite_without_text_matches_everything() {
    for mode in [SearchMode::Cultural, SearchMode::Investment] {
        let bare = body_for(&SearchRequest::new(mode));
        let inner = &bare["query"]["function_score"]["query"]["bool"];
        assert_eq!(inner["must"], json!([{ "match_all": {} }]), "{}", mode);
        assert!(inner.get("minimum_should_match").is_none());
        assert!(inner.get("filter").is_none());

        // a filter narrows the result set and leaves the scoring clauses alone
        let filtered = SearchRequest::new(mode)
            .with_filters(SearchFilters::builder().cities(["Boise"]).build().unwrap());
        let filtered = body_for(&filtered);
        let filtered_inner = &filtered["query"]["function_score"]["query"]["bool"];
        assert_eq!(filtered_inner["must"], inner["must"]);
        assert_eq!(filtered_inner["should"], inner["should"]);
        assert_eq!(
            filtered_inner["filter"],
            json!([{ "terms": { "address.city": ["boise"] } }])
        );
    }
}

#[test]
fn test_domain_score_is_optional_boost_with_text() {
    let body = body_for(&SearchRequest::new(SearchMode::Investment).with_query("duplex"));
    let inner = &body["query"]["function_score"]["query"]["bool"];

    assert_eq!(inner["must"][0]["multi_match"]["query"], "duplex");
    assert_eq!(
        inner["should"],
        json!([{ "range": { "neighborhood.investment_score": { "gte": 0.5, "boost": 2.0 } } }])
    );
    assert!(inner.get("minimum_should_match").is_none());
}

#[test]
fn test_composite_filters_are_kept() {
    let filters = SearchFilters::builder()
        .price_range(None, Some(900_000.0))
        .build()
        .unwrap();
    let request = SearchRequest::new(SearchMode::Investment)
        .with_query("rental income")
        .with_filters(filters);
    let body = body_for(&request);

    assert_eq!(
        body["query"]["function_score"]["query"]["bool"]["filter"],
        json!([{ "range": { "price": { "lte": 900000.0 } } }])
    );
}

// ============================================================================
// AGGREGATIONS AND DETERMINISM
// ============================================================================

#[test]
fn test_standard_aggregations() {
    let body = body_for(&SearchRequest::text("condo").with_aggregations(true));

    let aggs = body["aggs"].as_object().unwrap();
    assert_eq!(aggs.len(), 13);
    assert_eq!(aggs["cities"]["terms"]["field"], "address.city");
    assert_eq!(aggs["cities"]["terms"]["size"], 20);
    assert_eq!(aggs["price_histogram"]["histogram"]["interval"], 100000.0);
    assert_eq!(aggs["price_stats"], json!({ "stats": { "field": "price" } }));
    assert_eq!(
        aggs["price_ranges"]["range"]["ranges"][0],
        json!({ "key": "under_300k", "to": 300000.0 })
    );
}

#[test]
fn test_aggregation_subset() {
    let request = SearchRequest::text("condo").with_aggregation_subset(vec![
        AggregationName::Bedrooms,
        AggregationName::SizeStats,
        AggregationName::Bedrooms,
    ]);
    let body = body_for(&request);

    let aggs = body["aggs"].as_object().unwrap();
    let names: Vec<_> = aggs.keys().map(String::as_str).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"bedrooms"));
    assert!(names.contains(&"size_stats"));
}

#[test]
fn test_equal_requests_build_equal_bodies() {
    let filters = SearchFilters::builder()
        .features(["Fireplace", "garage", "fireplace"])
        .build()
        .unwrap();
    let request = SearchRequest::new(SearchMode::Cultural)
        .with_query("galleries")
        .with_filters(filters)
        .with_aggregations(true);

    let first = body_for(&request);
    let second = body_for(&request.clone());
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}
