use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

use crate::search::{SearchError, SearchResult};

/// Structured filters applied in filter context (no scoring).
///
/// String sets are trimmed, lower-cased and de-duplicated whenever a value is
/// built through [`SearchFiltersBuilder`] or deserialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,

    pub min_bedrooms: Option<u32>,
    pub max_bedrooms: Option<u32>,

    pub min_bathrooms: Option<f32>,
    pub max_bathrooms: Option<f32>,

    pub min_square_feet: Option<u32>,
    pub max_square_feet: Option<u32>,

    #[serde(deserialize_with = "normalized_set")]
    pub property_types: BTreeSet<String>,

    #[serde(deserialize_with = "normalized_option")]
    pub status: Option<String>,

    #[serde(deserialize_with = "normalized_set")]
    pub cities: BTreeSet<String>,

    #[serde(deserialize_with = "normalized_set")]
    pub states: BTreeSet<String>,

    #[serde(deserialize_with = "normalized_set")]
    pub zip_codes: BTreeSet<String>,

    /// Features that must all be present on the listing
    #[serde(deserialize_with = "normalized_set")]
    pub features: BTreeSet<String>,

    /// Amenities that must all be present on the listing
    #[serde(deserialize_with = "normalized_set")]
    pub amenities: BTreeSet<String>,

    pub min_parking_spaces: Option<u32>,

    pub garage_required: bool,

    pub listed_after: Option<NaiveDate>,
    pub listed_before: Option<NaiveDate>,

    pub min_year_built: Option<u32>,
    pub max_year_built: Option<u32>,

    pub max_hoa_fee: Option<f64>,
}

impl SearchFilters {
    /// Create a new builder
    pub fn builder() -> SearchFiltersBuilder {
        SearchFiltersBuilder::default()
    }

    /// True when no constraint is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check bound ordering and value domains
    pub fn ensure_valid(&self) -> SearchResult<()> {
        check_non_negative("min_price", self.min_price)?;
        check_non_negative("max_price", self.max_price)?;
        check_non_negative("max_hoa_fee", self.max_hoa_fee)?;
        check_non_negative("min_bathrooms", self.min_bathrooms.map(f64::from))?;
        check_non_negative("max_bathrooms", self.max_bathrooms.map(f64::from))?;

        check_bounds("price", self.min_price, self.max_price)?;
        check_bounds("bedrooms", self.min_bedrooms, self.max_bedrooms)?;
        check_bounds("bathrooms", self.min_bathrooms, self.max_bathrooms)?;
        check_bounds("square_feet", self.min_square_feet, self.max_square_feet)?;
        check_bounds("listing_date", self.listed_after, self.listed_before)?;
        check_bounds("year_built", self.min_year_built, self.max_year_built)?;

        Ok(())
    }

    /// Apply case normalization to every string field
    pub fn normalized(mut self) -> Self {
        self.property_types = normalize_set(self.property_types);
        self.cities = normalize_set(self.cities);
        self.states = normalize_set(self.states);
        self.zip_codes = normalize_set(self.zip_codes);
        self.features = normalize_set(self.features);
        self.amenities = normalize_set(self.amenities);
        self.status = self.status.as_deref().and_then(normalize_value);
        self
    }
}

fn check_non_negative(name: &str, value: Option<f64>) -> SearchResult<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(SearchError::Validation(format!(
            "{} must be a non-negative number, got {}",
            name, v
        ))),
        _ => Ok(()),
    }
}

fn check_bounds<T>(name: &str, min: Option<T>, max: Option<T>) -> SearchResult<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(SearchError::Validation(format!(
                "min_{name} ({min}) must not exceed max_{name} ({max})"
            )));
        }
    }
    Ok(())
}

fn normalize_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

fn normalize_set<I, S>(values: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .filter_map(|v| normalize_value(v.as_ref()))
        .collect()
}

fn normalized_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<String>>::deserialize(deserializer)?;
    Ok(normalize_set(raw.unwrap_or_default()))
}

fn normalized_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(normalize_value))
}

/// Fluent builder for [`SearchFilters`]; `build` normalizes and validates.
#[derive(Debug, Clone, Default)]
pub struct SearchFiltersBuilder {
    filters: SearchFilters,
}

impl SearchFiltersBuilder {
    pub fn price_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.filters.min_price = min;
        self.filters.max_price = max;
        self
    }

    pub fn bedrooms(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.filters.min_bedrooms = min;
        self.filters.max_bedrooms = max;
        self
    }

    pub fn bathrooms(mut self, min: Option<f32>, max: Option<f32>) -> Self {
        self.filters.min_bathrooms = min;
        self.filters.max_bathrooms = max;
        self
    }

    pub fn square_feet(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.filters.min_square_feet = min;
        self.filters.max_square_feet = max;
        self
    }

    pub fn property_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters
            .property_types
            .extend(types.into_iter().map(Into::into));
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.filters.status = Some(status.into());
        self
    }

    pub fn cities<I, S>(mut self, cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.cities.extend(cities.into_iter().map(Into::into));
        self
    }

    pub fn states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.states.extend(states.into_iter().map(Into::into));
        self
    }

    pub fn zip_codes<I, S>(mut self, zip_codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters
            .zip_codes
            .extend(zip_codes.into_iter().map(Into::into));
        self
    }

    pub fn features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters
            .features
            .extend(features.into_iter().map(Into::into));
        self
    }

    pub fn amenities<I, S>(mut self, amenities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters
            .amenities
            .extend(amenities.into_iter().map(Into::into));
        self
    }

    pub fn parking(mut self, min_spaces: Option<u32>, garage_required: bool) -> Self {
        self.filters.min_parking_spaces = min_spaces;
        self.filters.garage_required = garage_required;
        self
    }

    pub fn listed_between(mut self, after: Option<NaiveDate>, before: Option<NaiveDate>) -> Self {
        self.filters.listed_after = after;
        self.filters.listed_before = before;
        self
    }

    pub fn year_built(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.filters.min_year_built = min;
        self.filters.max_year_built = max;
        self
    }

    pub fn max_hoa_fee(mut self, fee: f64) -> Self {
        self.filters.max_hoa_fee = Some(fee);
        self
    }

    pub fn build(self) -> SearchResult<SearchFilters> {
        let filters = self.filters.normalized();
        filters.ensure_valid()?;
        Ok(filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_normalizes_sets() {
        let filters = SearchFilters::builder()
            .cities(["  Park City ", "park city", "SALT LAKE CITY"])
            .property_types(["Condo", ""])
            .status(" Active ")
            .build()
            .unwrap();

        assert_eq!(
            filters.cities.iter().cloned().collect::<Vec<_>>(),
            vec!["park city".to_string(), "salt lake city".to_string()]
        );
        assert_eq!(filters.property_types.len(), 1);
        assert_eq!(filters.status.as_deref(), Some("active"));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let result = SearchFilters::builder()
            .price_range(Some(800_000.0), Some(300_000.0))
            .build();
        assert!(matches!(result, Err(SearchError::Validation(_))));

        let result = SearchFilters::builder().bedrooms(Some(4), Some(2)).build();
        assert!(result.is_err());

        let result = SearchFilters::builder()
            .year_built(Some(2020), Some(1990))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_equal_bounds_accepted() {
        let filters = SearchFilters::builder()
            .bathrooms(Some(2.5), Some(2.5))
            .build()
            .unwrap();
        assert_eq!(filters.min_bathrooms, Some(2.5));
    }

    #[test]
    fn test_listing_dates_checked() {
        let after = NaiveDate::from_ymd_opt(2024, 6, 1);
        let before = NaiveDate::from_ymd_opt(2024, 1, 1);
        let result = SearchFilters::builder().listed_between(after, before).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_price_rejected() {
        let result = SearchFilters::builder().price_range(Some(-1.0), None).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialization_normalizes() {
        let filters: SearchFilters = serde_json::from_str(
            r#"{"cities": ["Park City", "PARK CITY"], "status": "Pending", "min_bedrooms": 3}"#,
        )
        .unwrap();

        assert_eq!(filters.cities.len(), 1);
        assert!(filters.cities.contains("park city"));
        assert_eq!(filters.status.as_deref(), Some("pending"));
        assert_eq!(filters.min_bedrooms, Some(3));
        assert!(!filters.is_empty());
    }

    #[test]
    fn test_default_is_empty() {
        assert!(SearchFilters::default().is_empty());
    }
}
