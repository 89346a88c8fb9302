use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

use super::filters::SearchFilters;
use crate::search::{SearchError, SearchResult};

/// A WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct GeoPoint {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,
}

impl GeoPoint {
    /// Create a validated coordinate
    pub fn new(lat: f64, lon: f64) -> SearchResult<Self> {
        let point = Self { lat, lon };
        point.validate()?;
        Ok(point)
    }
}

/// Distance units understood by the index's geo queries
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum DistanceUnit {
    #[default]
    #[serde(rename = "km", alias = "kilometers")]
    #[strum(serialize = "km")]
    Kilometers,

    #[serde(rename = "mi", alias = "miles")]
    #[strum(serialize = "mi")]
    Miles,

    #[serde(rename = "m", alias = "meters")]
    #[strum(serialize = "m")]
    Meters,

    #[serde(rename = "ft", alias = "feet")]
    #[strum(serialize = "ft")]
    Feet,
}

/// Radius search around a center point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GeoSearchParams {
    #[validate(nested)]
    pub center: GeoPoint,

    pub radius: f64,

    #[serde(default)]
    pub unit: DistanceUnit,

    #[serde(default)]
    pub filters: Option<SearchFilters>,
}

impl GeoSearchParams {
    /// Create validated geo parameters
    pub fn new(center: GeoPoint, radius: f64, unit: DistanceUnit) -> SearchResult<Self> {
        let params = Self {
            center,
            radius,
            unit,
            filters: None,
        };
        params.ensure_valid()?;
        Ok(params)
    }

    /// Attach structured filters
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn ensure_valid(&self) -> SearchResult<()> {
        self.validate()?;
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(SearchError::Validation(format!(
                "radius must be greater than 0, got {}",
                self.radius
            )));
        }
        if let Some(ref filters) = self.filters {
            filters.ensure_valid()?;
        }
        Ok(())
    }

    /// Distance string in the query DSL form, e.g. `5km`
    pub fn distance(&self) -> String {
        format!("{}{}", self.radius, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_bounds() {
        assert!(GeoPoint::new(40.6461, -111.4980).is_ok());
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(90.5, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.1).is_err());
    }

    #[test]
    fn test_radius_must_be_positive() {
        let center = GeoPoint::new(40.0, -111.0).unwrap();
        assert!(GeoSearchParams::new(center, 0.0, DistanceUnit::Kilometers).is_err());
        assert!(GeoSearchParams::new(center, -3.0, DistanceUnit::Miles).is_err());
        assert!(GeoSearchParams::new(center, 2.5, DistanceUnit::Miles).is_ok());
    }

    #[test]
    fn test_distance_format() {
        let center = GeoPoint::new(40.6461, -111.4980).unwrap();
        let params = GeoSearchParams::new(center, 5.0, DistanceUnit::Kilometers).unwrap();
        assert_eq!(params.distance(), "5km");

        let params = GeoSearchParams::new(center, 2.5, DistanceUnit::Miles).unwrap();
        assert_eq!(params.distance(), "2.5mi");
    }

    #[test]
    fn test_unit_deserialization() {
        let params: GeoSearchParams = serde_json::from_str(
            r#"{"center": {"lat": 40.0, "lon": -111.0}, "radius": 3, "unit": "miles"}"#,
        )
        .unwrap();
        assert_eq!(params.unit, DistanceUnit::Miles);

        let params: GeoSearchParams =
            serde_json::from_str(r#"{"center": {"lat": 40.0, "lon": -111.0}, "radius": 3}"#)
                .unwrap();
        assert_eq!(params.unit, DistanceUnit::Kilometers);
    }

    #[test]
    fn test_invalid_center_caught_by_ensure_valid() {
        let params: GeoSearchParams =
            serde_json::from_str(r#"{"center": {"lat": 91.0, "lon": 0.0}, "radius": 1}"#).unwrap();
        assert!(matches!(params.ensure_valid(), Err(SearchError::Validation(_))));
    }
}
