//! Mapping raw store responses into typed search results.
//!
//! Corrupt hits and malformed aggregations never fail a search: they are
//! logged, counted and left out of the response.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

use super::aggregations::AggregationSpec;
use super::error::{SearchError, SearchResult};
use super::query::SearchBody;
use crate::metrics::{AGGREGATION_PARSE_ERRORS_TOTAL, SEARCH_DROPPED_HITS_TOTAL};
use crate::models::{
    total_pages, Aggregation, AggregationName, Bucket, BucketAggregation, PropertyDocument,
    PropertyHit, SearchRequest, SearchResponse, StatsAggregation,
};
use crate::store::{RawHit, RawSearchResponse};

/// Bucket fields that are not sub-aggregations
const BUCKET_RESERVED_KEYS: &[&str] = &[
    "key",
    "key_as_string",
    "doc_count",
    "from",
    "from_as_string",
    "to",
    "to_as_string",
];

/// Build the typed response for `request` from the store's answer to `body`
pub fn assemble_response(
    request: SearchRequest,
    body: &SearchBody,
    raw: RawSearchResponse,
    execution_time_ms: u64,
) -> SearchResponse {
    let mode = request.mode.to_string();
    let hits = map_hits(raw.hits, body.distance_sort_index(), &mode);

    let aggregations = if body.aggregations.is_empty() {
        None
    } else {
        Some(parse_aggregations(&raw.aggregations, &body.aggregations))
    };

    let pages = total_pages(raw.total, request.size);

    SearchResponse {
        hits,
        total: raw.total,
        page: request.page,
        size: request.size,
        total_pages: pages,
        has_next: request.page < pages,
        has_previous: request.page > 1,
        execution_time_ms,
        aggregations,
        request,
        error: None,
    }
}

/// Map raw hits in order, dropping any whose source does not deserialize
pub fn map_hits(raw: Vec<RawHit>, distance_index: Option<usize>, mode: &str) -> Vec<PropertyHit> {
    raw.into_iter()
        .filter_map(|hit| match map_hit(hit, distance_index) {
            Ok(hit) => Some(hit),
            Err(e) => {
                warn!(mode = mode, error = %e, "Dropping corrupt search hit");
                SEARCH_DROPPED_HITS_TOTAL.with_label_values(&[mode]).inc();
                None
            }
        })
        .collect()
}

fn map_hit(raw: RawHit, distance_index: Option<usize>) -> SearchResult<PropertyHit> {
    let RawHit {
        id,
        score,
        source,
        sort,
        highlight,
    } = raw;

    let property: PropertyDocument = serde_json::from_value(source)
        .map_err(|e| SearchError::ResultProcessing(format!("hit '{}': {}", id, e)))?;

    let distance = distance_index
        .and_then(|index| sort.get(index))
        .and_then(Value::as_f64);

    Ok(PropertyHit {
        id,
        property,
        score: score.filter(|s| s.is_finite()),
        distance,
        highlights: highlight,
    })
}

/// Parse every requested aggregation present in `raw`
pub fn parse_aggregations(
    raw: &Map<String, Value>,
    specs: &BTreeMap<AggregationName, AggregationSpec>,
) -> BTreeMap<AggregationName, Aggregation> {
    let mut parsed = BTreeMap::new();

    for (name, spec) in specs {
        let key: &str = name.as_ref();
        let Some(value) = raw.get(key) else {
            continue;
        };
        match parse_aggregation(*name, spec, value) {
            Ok(aggregation) => {
                parsed.insert(*name, aggregation);
            }
            Err(e) => {
                warn!(aggregation = %name, error = %e, "Omitting malformed aggregation");
                AGGREGATION_PARSE_ERRORS_TOTAL.with_label_values(&[key]).inc();
            }
        }
    }

    parsed
}

fn parse_aggregation(
    name: AggregationName,
    spec: &AggregationSpec,
    value: &Value,
) -> SearchResult<Aggregation> {
    let result = if spec.is_stats() {
        parse_stats(value).map(Aggregation::Stats)
    } else {
        parse_buckets(value).map(Aggregation::Buckets)
    };

    result.map_err(|message| SearchError::Aggregation {
        name: name.to_string(),
        message,
    })
}

fn parse_stats(value: &Value) -> Result<StatsAggregation, String> {
    serde_json::from_value(value.clone()).map_err(|e| e.to_string())
}

fn parse_buckets(value: &Value) -> Result<BucketAggregation, String> {
    let buckets = value
        .get("buckets")
        .ok_or_else(|| "missing 'buckets'".to_string())?;

    let buckets = match buckets {
        Value::Array(items) => items
            .iter()
            .map(|item| parse_bucket(None, item))
            .collect::<Result<Vec<_>, _>>()?,
        // keyed ranges come back as an object
        Value::Object(items) => items
            .iter()
            .map(|(key, item)| parse_bucket(Some(key), item))
            .collect::<Result<Vec<_>, _>>()?,
        other => return Err(format!("'buckets' has unexpected shape: {}", other)),
    };

    Ok(BucketAggregation { buckets })
}

fn parse_bucket(keyed: Option<&String>, value: &Value) -> Result<Bucket, String> {
    let object = value
        .as_object()
        .ok_or_else(|| format!("bucket is not an object: {}", value))?;

    let key = match keyed {
        Some(key) => key.clone(),
        None => object
            .get("key_as_string")
            .or_else(|| object.get("key"))
            .and_then(format_key)
            .ok_or_else(|| "bucket without key".to_string())?,
    };

    let doc_count = object
        .get("doc_count")
        .and_then(Value::as_u64)
        .ok_or_else(|| format!("bucket '{}' without doc_count", key))?;

    let mut sub_aggregations = BTreeMap::new();
    for (field, nested) in object {
        if BUCKET_RESERVED_KEYS.contains(&field.as_str()) {
            continue;
        }
        if let Some(aggregation) = parse_untyped(nested) {
            sub_aggregations.insert(field.clone(), aggregation);
        }
    }

    Ok(Bucket {
        key,
        doc_count,
        from: object.get("from").and_then(Value::as_f64),
        to: object.get("to").and_then(Value::as_f64),
        sub_aggregations,
    })
}

/// Sub-aggregations carry no spec, so their kind is inferred from shape
fn parse_untyped(value: &Value) -> Option<Aggregation> {
    let object = value.as_object()?;
    if object.contains_key("buckets") {
        parse_buckets(value).ok().map(Aggregation::Buckets)
    } else if object.contains_key("count") && object.contains_key("sum") {
        parse_stats(value).ok().map(Aggregation::Stats)
    } else {
        None
    }
}

/// Bucket keys as strings; whole numbers lose their fractional part
fn format_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i.to_string());
            }
            let f = n.as_f64()?;
            if f.fract() == 0.0 && f.abs() < 1e15 {
                Some(format!("{}", f as i64))
            } else {
                Some(f.to_string())
            }
        }
        _ => None,
    }
}
