use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Fixed set of facet/statistic aggregations the gateway knows how to build
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
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
pub enum AggregationName {
    PriceRanges,
    PriceHistogram,
    PropertyTypes,
    Cities,
    Neighborhoods,
    Bedrooms,
    Bathrooms,
    Features,
    Amenities,
    StatusDistribution,
    YearBuiltRanges,
    PriceStats,
    SizeStats,
}

/// Parsed aggregation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Aggregation {
    Buckets(BucketAggregation),
    Stats(StatsAggregation),
}

impl Aggregation {
    pub fn as_buckets(&self) -> Option<&BucketAggregation> {
        match self {
            Aggregation::Buckets(buckets) => Some(buckets),
            Aggregation::Stats(_) => None,
        }
    }

    pub fn as_stats(&self) -> Option<&StatsAggregation> {
        match self {
            Aggregation::Stats(stats) => Some(stats),
            Aggregation::Buckets(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketAggregation {
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: String,
    pub doc_count: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<f64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sub_aggregations: BTreeMap<String, Aggregation>,
}

/// Numeric statistics; min/max/avg are absent when no document matched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsAggregation {
    pub count: u64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub sum: f64,
}
