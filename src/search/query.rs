//! Backend query expression tree.
//!
//! Queries are built as plain values and turned into the Elasticsearch query
//! DSL only by [`Query::to_json`] / [`SearchBody::to_json`], so two equal
//! requests always produce equal trees.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use super::aggregations::AggregationSpec;
use crate::models::{AggregationName, DistanceUnit, GeoPoint};

/// A node in the query tree
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    MultiMatch {
        query: String,
        /// Field names with optional `^boost` suffix
        fields: Vec<String>,
        fuzziness: Option<String>,
        boost: Option<f64>,
    },
    Match {
        field: String,
        query: String,
        boost: Option<f64>,
    },
    Term {
        field: String,
        value: Value,
    },
    Terms {
        field: String,
        values: Vec<Value>,
    },
    Range {
        field: String,
        gte: Option<Value>,
        lte: Option<Value>,
        boost: Option<f64>,
    },
    Exists {
        field: String,
    },
    GeoDistance {
        field: String,
        center: GeoPoint,
        /// Distance with unit suffix, e.g. `5km`
        distance: String,
    },
    MoreLikeThis {
        fields: Vec<String>,
        like: Vec<LikeDocument>,
        min_term_freq: u32,
        min_doc_freq: u32,
        max_query_terms: u32,
    },
    Nested {
        path: String,
        query: Box<Query>,
    },
    Bool(BoolQuery),
    FunctionScore {
        query: Box<Query>,
        functions: Vec<ScoreFunction>,
        boost_mode: BoostMode,
        score_mode: ScoreMode,
    },
}

impl Query {
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn terms<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Query::Terms {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Range with only a lower bound
    pub fn at_least(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Range {
            field: field.into(),
            gte: Some(value.into()),
            lte: None,
            boost: None,
        }
    }

    /// Range with only an upper bound
    pub fn at_most(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Range {
            field: field.into(),
            gte: None,
            lte: Some(value.into()),
            boost: None,
        }
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Query::Exists {
            field: field.into(),
        }
    }

    pub fn match_text(field: impl Into<String>, query: impl Into<String>) -> Self {
        Query::Match {
            field: field.into(),
            query: query.into(),
            boost: None,
        }
    }

    pub fn nested(path: impl Into<String>, query: Query) -> Self {
        Query::Nested {
            path: path.into(),
            query: Box::new(query),
        }
    }

    /// Serialize into the Elasticsearch query DSL
    pub fn to_json(&self) -> Value {
        match self {
            Query::MatchAll => json!({ "match_all": {} }),
            Query::MultiMatch {
                query,
                fields,
                fuzziness,
                boost,
            } => {
                let mut body = Map::new();
                body.insert("query".into(), json!(query));
                body.insert("fields".into(), json!(fields));
                body.insert("type".into(), json!("best_fields"));
                if let Some(fuzziness) = fuzziness {
                    body.insert("fuzziness".into(), json!(fuzziness));
                }
                insert_boost(&mut body, *boost);
                json!({ "multi_match": body })
            }
            Query::Match {
                field,
                query,
                boost,
            } => {
                let mut body = Map::new();
                body.insert("query".into(), json!(query));
                insert_boost(&mut body, *boost);
                json!({ "match": { field.as_str(): body } })
            }
            Query::Term { field, value } => json!({ "term": { field.as_str(): value } }),
            Query::Terms { field, values } => json!({ "terms": { field.as_str(): values } }),
            Query::Range {
                field,
                gte,
                lte,
                boost,
            } => {
                let mut body = Map::new();
                if let Some(gte) = gte {
                    body.insert("gte".into(), gte.clone());
                }
                if let Some(lte) = lte {
                    body.insert("lte".into(), lte.clone());
                }
                insert_boost(&mut body, *boost);
                json!({ "range": { field.as_str(): body } })
            }
            Query::Exists { field } => json!({ "exists": { "field": field } }),
            Query::GeoDistance {
                field,
                center,
                distance,
            } => json!({
                "geo_distance": {
                    "distance": distance,
                    field.as_str(): { "lat": center.lat, "lon": center.lon }
                }
            }),
            Query::MoreLikeThis {
                fields,
                like,
                min_term_freq,
                min_doc_freq,
                max_query_terms,
            } => json!({
                "more_like_this": {
                    "fields": fields,
                    "like": like.iter().map(LikeDocument::to_json).collect::<Vec<_>>(),
                    "min_term_freq": min_term_freq,
                    "min_doc_freq": min_doc_freq,
                    "max_query_terms": max_query_terms
                }
            }),
            Query::Nested { path, query } => json!({
                "nested": { "path": path, "query": query.to_json() }
            }),
            Query::Bool(bool_query) => bool_query.to_json(),
            Query::FunctionScore {
                query,
                functions,
                boost_mode,
                score_mode,
            } => json!({
                "function_score": {
                    "query": query.to_json(),
                    "functions": functions.iter().map(ScoreFunction::to_json).collect::<Vec<_>>(),
                    "boost_mode": boost_mode.as_str(),
                    "score_mode": score_mode.as_str()
                }
            }),
        }
    }
}

fn insert_boost(body: &mut Map<String, Value>, boost: Option<f64>) {
    if let Some(boost) = boost {
        body.insert("boost".into(), json!(boost));
    }
}

/// Compound boolean query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Query>,
    pub should: Vec<Query>,
    pub filter: Vec<Query>,
    pub must_not: Vec<Query>,
    pub minimum_should_match: Option<u32>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }

    pub fn filters(mut self, queries: impl IntoIterator<Item = Query>) -> Self {
        self.filter.extend(queries);
        self
    }

    pub fn must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn minimum_should_match(mut self, minimum: u32) -> Self {
        self.minimum_should_match = Some(minimum);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.should.is_empty()
            && self.filter.is_empty()
            && self.must_not.is_empty()
    }

    /// `match_all` when no clause was added
    pub fn into_query(self) -> Query {
        if self.is_empty() {
            Query::MatchAll
        } else {
            Query::Bool(self)
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        for (key, clauses) in [
            ("must", &self.must),
            ("should", &self.should),
            ("filter", &self.filter),
            ("must_not", &self.must_not),
        ] {
            if !clauses.is_empty() {
                body.insert(
                    key.into(),
                    Value::Array(clauses.iter().map(Query::to_json).collect()),
                );
            }
        }
        if let Some(minimum) = self.minimum_should_match {
            body.insert("minimum_should_match".into(), json!(minimum));
        }
        json!({ "bool": body })
    }
}

/// Reference to an indexed document for `more_like_this`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeDocument {
    pub index: String,
    pub id: String,
}

impl LikeDocument {
    pub fn to_json(&self) -> Value {
        json!({ "_index": self.index, "_id": self.id })
    }
}

/// One function inside a `function_score` query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreFunction {
    /// Restricts the function to matching documents
    pub filter: Option<Query>,
    pub kind: ScoreFunctionKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreFunctionKind {
    FieldValueFactor {
        field: String,
        factor: f64,
        modifier: FieldValueModifier,
        /// Value used when the field is absent
        missing: f64,
    },
    Weight(f64),
}

impl ScoreFunction {
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        if let Some(filter) = &self.filter {
            body.insert("filter".into(), filter.to_json());
        }
        match &self.kind {
            ScoreFunctionKind::FieldValueFactor {
                field,
                factor,
                modifier,
                missing,
            } => {
                body.insert(
                    "field_value_factor".into(),
                    json!({
                        "field": field,
                        "factor": factor,
                        "modifier": modifier.as_str(),
                        "missing": missing
                    }),
                );
            }
            ScoreFunctionKind::Weight(weight) => {
                body.insert("weight".into(), json!(weight));
            }
        }
        Value::Object(body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValueModifier {
    None,
    Log1p,
    Sqrt,
}

impl FieldValueModifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldValueModifier::None => "none",
            FieldValueModifier::Log1p => "log1p",
            FieldValueModifier::Sqrt => "sqrt",
        }
    }
}

/// How the function score combines with the query score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostMode {
    Multiply,
    Sum,
    Replace,
}

impl BoostMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoostMode::Multiply => "multiply",
            BoostMode::Sum => "sum",
            BoostMode::Replace => "replace",
        }
    }
}

/// How individual function scores are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMode {
    Multiply,
    Sum,
    Max,
}

impl ScoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreMode::Multiply => "multiply",
            ScoreMode::Sum => "sum",
            ScoreMode::Max => "max",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq)]
pub enum SortClause {
    /// Relevance, descending
    Score,
    /// Field value; documents without the field sort last
    Field {
        field: String,
        direction: SortDirection,
    },
    /// Distance from a point, reported in `unit`
    GeoDistance {
        field: String,
        center: GeoPoint,
        unit: DistanceUnit,
        direction: SortDirection,
    },
}

impl SortClause {
    pub fn field(field: impl Into<String>, direction: SortDirection) -> Self {
        SortClause::Field {
            field: field.into(),
            direction,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SortClause::Score => json!({ "_score": { "order": "desc" } }),
            SortClause::Field { field, direction } => json!({
                field.as_str(): { "order": direction.as_str(), "missing": "_last" }
            }),
            SortClause::GeoDistance {
                field,
                center,
                unit,
                direction,
            } => json!({
                "_geo_distance": {
                    field.as_str(): { "lat": center.lat, "lon": center.lon },
                    "order": direction.as_str(),
                    "unit": unit.to_string(),
                    "distance_type": "arc"
                }
            }),
        }
    }
}

/// Highlighting request
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightSpec {
    pub fields: Vec<String>,
    pub pre_tag: String,
    pub post_tag: String,
    pub fragment_size: u32,
    pub number_of_fragments: u32,
}

impl HighlightSpec {
    pub fn to_json(&self) -> Value {
        let fields: Map<String, Value> = self
            .fields
            .iter()
            .map(|field| (field.clone(), json!({})))
            .collect();
        json!({
            "fields": fields,
            "pre_tags": [self.pre_tag],
            "post_tags": [self.post_tag],
            "fragment_size": self.fragment_size,
            "number_of_fragments": self.number_of_fragments
        })
    }
}

/// Complete search request sent to the store
#[derive(Debug, Clone, PartialEq)]
pub struct SearchBody {
    pub query: Query,
    pub sort: Vec<SortClause>,
    pub from: u64,
    pub size: u32,
    pub highlight: Option<HighlightSpec>,
    pub aggregations: BTreeMap<AggregationName, AggregationSpec>,
    pub track_total_hits: bool,
}

impl SearchBody {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            sort: Vec::new(),
            from: 0,
            size: 0,
            highlight: None,
            aggregations: BTreeMap::new(),
            track_total_hits: true,
        }
    }

    /// Position of the distance key among the hit sort values
    pub fn distance_sort_index(&self) -> Option<usize> {
        self.sort
            .iter()
            .position(|clause| matches!(clause, SortClause::GeoDistance { .. }))
    }

    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".into(), self.query.to_json());
        body.insert("from".into(), json!(self.from));
        body.insert("size".into(), json!(self.size));
        body.insert("track_total_hits".into(), json!(self.track_total_hits));

        if !self.sort.is_empty() {
            body.insert(
                "sort".into(),
                Value::Array(self.sort.iter().map(SortClause::to_json).collect()),
            );
        }
        if let Some(highlight) = &self.highlight {
            body.insert("highlight".into(), highlight.to_json());
        }
        if !self.aggregations.is_empty() {
            let aggs: Map<String, Value> = self
                .aggregations
                .iter()
                .map(|(name, spec)| (name.to_string(), spec.to_json()))
                .collect();
            body.insert("aggs".into(), Value::Object(aggs));
        }

        Value::Object(body)
    }
}

/// Body for a `_count` call
pub fn count_body(query: &Query) -> Value {
    json!({ "query": query.to_json() })
}
