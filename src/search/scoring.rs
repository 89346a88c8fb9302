//! Ranking clauses for the enrichment-aware search modes.
//!
//! Each composite mode requires a keyword match against enrichment fields,
//! boosts optionally on its own domain score, and is wrapped in a shared `function_score` that
//! favours desirable neighborhoods, listings correlated with Wikipedia
//! articles, and listings near significant points of interest.

use super::config::ScoringConfig;
use super::query::{
    BoolQuery, BoostMode, FieldValueModifier, Query, ScoreFunction, ScoreFunctionKind, ScoreMode,
};
use crate::models::SearchMode;

/// Score field a composite mode sorts and boosts on
pub fn domain_score_field(mode: SearchMode) -> Option<&'static str> {
    match mode {
        SearchMode::Lifestyle => Some("neighborhood.lifestyle_score"),
        SearchMode::PoiProximity => Some("location_context.location_quality_score"),
        SearchMode::Cultural => Some("location_context.cultural_richness"),
        SearchMode::Investment => Some("neighborhood.investment_score"),
        _ => None,
    }
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn keyword_match(query: &str, names: &[&str]) -> Query {
    Query::MultiMatch {
        query: query.to_string(),
        fields: fields(names),
        fuzziness: None,
        boost: None,
    }
}

/// Wrap `query` in the shared enrichment `function_score`
pub fn with_enrichment_scoring(query: Query, config: &ScoringConfig) -> Query {
    let poi_significance = Query::nested(
        "nearby_poi",
        Query::at_least(
            "nearby_poi.significance_score",
            config.poi_significance_threshold,
        ),
    );

    Query::FunctionScore {
        query: Box::new(query),
        functions: vec![
            ScoreFunction {
                filter: None,
                kind: ScoreFunctionKind::FieldValueFactor {
                    field: config.desirability_field.clone(),
                    factor: 1.0,
                    modifier: FieldValueModifier::Log1p,
                    missing: 1.0,
                },
            },
            ScoreFunction {
                filter: Some(Query::exists(config.wikipedia_field.clone())),
                kind: ScoreFunctionKind::Weight(config.wikipedia_weight),
            },
            ScoreFunction {
                filter: Some(poi_significance),
                kind: ScoreFunctionKind::Weight(config.poi_weight),
            },
        ],
        boost_mode: BoostMode::Multiply,
        score_mode: ScoreMode::Sum,
    }
}

/// Keyword clause a composite mode requires; `None` without text
fn keyword_clause(mode: SearchMode, text: &str) -> Option<Query> {
    let clause = match mode {
        SearchMode::Lifestyle => keyword_match(
            text,
            &[
                "location_context.lifestyle_tags^2",
                "location_context.summary",
                "neighborhood.description",
                "recreational_features^1.5",
                "amenities",
            ],
        ),
        SearchMode::PoiProximity => BoolQuery::new()
            .should(Query::nested(
                "nearby_poi",
                keyword_match(
                    text,
                    &[
                        "nearby_poi.name^2",
                        "nearby_poi.category^1.5",
                        "nearby_poi.description",
                    ],
                ),
            ))
            .should(keyword_match(text, &["location_context.summary"]))
            .minimum_should_match(1)
            .into_query(),
        SearchMode::Cultural => keyword_match(
            text,
            &[
                "cultural_features^2",
                "location_context.cultural_tags^2",
                "location_context.summary",
                "neighborhood.description",
            ],
        ),
        SearchMode::Investment => keyword_match(
            text,
            &["description", "neighborhood.description", "search_tags"],
        ),
        _ => return None,
    };
    Some(clause)
}

/// Clauses for a composite mode; empty for any other mode.
///
/// The keyword match (or `match_all` without text) is required. Domain
/// signals are optional `should` clauses that only raise the score.
pub fn composite_clauses(mode: SearchMode, text: Option<&str>, config: &ScoringConfig) -> BoolQuery {
    let Some(field) = domain_score_field(mode) else {
        return BoolQuery::new();
    };

    let required = text
        .and_then(|text| keyword_clause(mode, text))
        .unwrap_or(Query::MatchAll);
    let mut clauses = BoolQuery::new().must(required);

    if mode == SearchMode::Cultural {
        clauses = clauses.should(Query::exists("cultural_features"));
    }

    clauses.should(Query::Range {
        field: field.to_string(),
        gte: Some(config.domain_score_floor.into()),
        lte: None,
        boost: Some(config.domain_score_boost),
    })
}
