//! Facet and statistics aggregations

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

use super::config::AggregationConfig;
use crate::models::AggregationName;

/// A named range bucket; `from` is inclusive, `to` exclusive
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBucket {
    pub key: String,
    pub from: Option<f64>,
    pub to: Option<f64>,
}

impl RangeBucket {
    fn new(key: &str, from: Option<f64>, to: Option<f64>) -> Self {
        Self {
            key: key.to_string(),
            from,
            to,
        }
    }
}

/// Aggregation definition sent to the store
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationSpec {
    /// Most frequent values, count descending
    Terms { field: String, size: u32 },
    Range {
        field: String,
        ranges: Vec<RangeBucket>,
    },
    Histogram {
        field: String,
        interval: f64,
        min_doc_count: u64,
    },
    Stats { field: String },
}

impl AggregationSpec {
    pub fn field(&self) -> &str {
        match self {
            AggregationSpec::Terms { field, .. }
            | AggregationSpec::Range { field, .. }
            | AggregationSpec::Histogram { field, .. }
            | AggregationSpec::Stats { field } => field,
        }
    }

    pub fn is_stats(&self) -> bool {
        matches!(self, AggregationSpec::Stats { .. })
    }

    pub fn to_json(&self) -> Value {
        match self {
            AggregationSpec::Terms { field, size } => json!({
                "terms": { "field": field, "size": size, "order": { "_count": "desc" } }
            }),
            AggregationSpec::Range { field, ranges } => {
                let ranges: Vec<Value> = ranges
                    .iter()
                    .map(|range| {
                        let mut bucket = Map::new();
                        bucket.insert("key".into(), json!(range.key));
                        if let Some(from) = range.from {
                            bucket.insert("from".into(), json!(from));
                        }
                        if let Some(to) = range.to {
                            bucket.insert("to".into(), json!(to));
                        }
                        Value::Object(bucket)
                    })
                    .collect();
                json!({ "range": { "field": field, "ranges": ranges } })
            }
            AggregationSpec::Histogram {
                field,
                interval,
                min_doc_count,
            } => json!({
                "histogram": { "field": field, "interval": interval, "min_doc_count": min_doc_count }
            }),
            AggregationSpec::Stats { field } => json!({ "stats": { "field": field } }),
        }
    }
}

/// Builds the standard set of facet aggregations
#[derive(Debug, Clone, Default)]
pub struct AggregationBuilder {
    config: AggregationConfig,
}

impl AggregationBuilder {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    /// Specification for a single aggregation
    pub fn spec(&self, name: AggregationName) -> AggregationSpec {
        let terms = |field: &str| AggregationSpec::Terms {
            field: field.to_string(),
            size: self.config.terms_size,
        };

        match name {
            AggregationName::PriceRanges => AggregationSpec::Range {
                field: "price".to_string(),
                ranges: vec![
                    RangeBucket::new("under_300k", None, Some(300_000.0)),
                    RangeBucket::new("300k_500k", Some(300_000.0), Some(500_000.0)),
                    RangeBucket::new("500k_750k", Some(500_000.0), Some(750_000.0)),
                    RangeBucket::new("750k_1m", Some(750_000.0), Some(1_000_000.0)),
                    RangeBucket::new("over_1m", Some(1_000_000.0), None),
                ],
            },
            AggregationName::PriceHistogram => AggregationSpec::Histogram {
                field: "price".to_string(),
                interval: self.config.price_histogram_interval,
                min_doc_count: 1,
            },
            AggregationName::PropertyTypes => terms("property_type"),
            AggregationName::Cities => terms("address.city"),
            AggregationName::Neighborhoods => terms("neighborhood.name"),
            AggregationName::Bedrooms => terms("bedrooms"),
            AggregationName::Bathrooms => terms("bathrooms"),
            AggregationName::Features => terms("features"),
            AggregationName::Amenities => terms("amenities"),
            AggregationName::StatusDistribution => terms("status"),
            AggregationName::YearBuiltRanges => AggregationSpec::Range {
                field: "year_built".to_string(),
                ranges: vec![
                    RangeBucket::new("pre_1950", None, Some(1950.0)),
                    RangeBucket::new("1950_1979", Some(1950.0), Some(1980.0)),
                    RangeBucket::new("1980_1999", Some(1980.0), Some(2000.0)),
                    RangeBucket::new("2000_2009", Some(2000.0), Some(2010.0)),
                    RangeBucket::new("2010_plus", Some(2010.0), None),
                ],
            },
            AggregationName::PriceStats => AggregationSpec::Stats {
                field: "price".to_string(),
            },
            AggregationName::SizeStats => AggregationSpec::Stats {
                field: "square_feet".to_string(),
            },
        }
    }

    /// Every known aggregation
    pub fn build_standard(&self) -> BTreeMap<AggregationName, AggregationSpec> {
        AggregationName::iter()
            .map(|name| (name, self.spec(name)))
            .collect()
    }

    /// Only the named aggregations; duplicates collapse
    pub fn build_subset(&self, names: &[AggregationName]) -> BTreeMap<AggregationName, AggregationSpec> {
        names.iter().map(|&name| (name, self.spec(name))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_set_is_complete() {
        let specs = AggregationBuilder::default().build_standard();
        assert_eq!(specs.len(), 13);
        assert!(specs[&AggregationName::PriceStats].is_stats());
        assert_eq!(specs[&AggregationName::Cities].field(), "address.city");
        assert_eq!(specs[&AggregationName::StatusDistribution].field(), "status");
        assert_eq!(specs[&AggregationName::SizeStats].field(), "square_feet");
    }

    #[test]
    fn test_price_ranges_cover_boundaries() {
        let spec = AggregationBuilder::default().spec(AggregationName::PriceRanges);
        let json = spec.to_json();
        let ranges = json["range"]["ranges"].as_array().unwrap();

        assert_eq!(ranges.len(), 5);
        assert_eq!(ranges[0], json!({"key": "under_300k", "to": 300_000.0}));
        assert_eq!(ranges[4], json!({"key": "over_1m", "from": 1_000_000.0}));
        // each upper bound is the next lower bound
        for pair in ranges.windows(2) {
            assert_eq!(pair[0]["to"], pair[1]["from"]);
        }
    }

    #[test]
    fn test_year_built_ranges() {
        let spec = AggregationBuilder::default().spec(AggregationName::YearBuiltRanges);
        match spec {
            AggregationSpec::Range { ranges, .. } => {
                let keys: Vec<_> = ranges.iter().map(|r| r.key.as_str()).collect();
                assert_eq!(
                    keys,
                    vec!["pre_1950", "1950_1979", "1980_1999", "2000_2009", "2010_plus"]
                );
            }
            other => panic!("unexpected spec {:?}", other),
        }
    }

    #[test]
    fn test_configurable_sizes() {
        let builder = AggregationBuilder::new(AggregationConfig {
            terms_size: 5,
            price_histogram_interval: 50_000.0,
        });

        let terms = builder.spec(AggregationName::Features).to_json();
        assert_eq!(terms["terms"]["size"], 5);
        assert_eq!(terms["terms"]["order"]["_count"], "desc");

        let histogram = builder.spec(AggregationName::PriceHistogram).to_json();
        assert_eq!(histogram["histogram"]["interval"], 50_000.0);
        assert_eq!(histogram["histogram"]["min_doc_count"], 1);
    }

    #[test]
    fn test_subset() {
        let specs = AggregationBuilder::default().build_subset(&[
            AggregationName::Bedrooms,
            AggregationName::PriceStats,
            AggregationName::Bedrooms,
        ]);
        assert_eq!(specs.len(), 2);
        assert!(specs.contains_key(&AggregationName::Bedrooms));
    }
}
