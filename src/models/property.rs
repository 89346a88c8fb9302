//! Property listing documents as stored in the search index.
//!
//! Only `listing_id` is mandatory; everything else is optional so that
//! partially enriched documents still map cleanly. A document whose fields
//! have the wrong shape fails to deserialize and is dropped from results.

use serde::{Deserialize, Serialize};

use super::geo::GeoPoint;

/// A property listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDocument {
    pub listing_id: String,

    #[serde(default)]
    pub property_type: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub price: Option<f64>,

    #[serde(default)]
    pub bedrooms: Option<u32>,

    #[serde(default)]
    pub bathrooms: Option<f32>,

    #[serde(default)]
    pub square_feet: Option<u32>,

    #[serde(default)]
    pub lot_size: Option<f64>,

    #[serde(default)]
    pub year_built: Option<u32>,

    /// ISO-8601 listing date
    #[serde(default)]
    pub listing_date: Option<String>,

    #[serde(default)]
    pub hoa_fee: Option<f64>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub features: Vec<String>,

    #[serde(default)]
    pub amenities: Vec<String>,

    #[serde(default)]
    pub search_tags: Vec<String>,

    #[serde(default)]
    pub address: Option<Address>,

    #[serde(default)]
    pub neighborhood: Option<NeighborhoodSummary>,

    #[serde(default)]
    pub parking: Option<Parking>,

    #[serde(default)]
    pub location_context: Option<LocationContext>,

    #[serde(default)]
    pub nearby_poi: Vec<PointOfInterest>,

    #[serde(default)]
    pub cultural_features: Vec<String>,

    #[serde(default)]
    pub recreational_features: Vec<String>,

    #[serde(default)]
    pub virtual_tour_url: Option<String>,

    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborhoodSummary {
    pub neighborhood_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// 0-10 desirability rating used by enrichment scoring
    pub desirability_score: Option<f64>,
    pub lifestyle_score: Option<f64>,
    pub investment_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parking {
    pub spaces: Option<u32>,
    #[serde(rename = "type")]
    pub parking_type: Option<String>,
}

/// Location summary derived from enrichment sources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationContext {
    pub summary: Option<String>,
    pub lifestyle_tags: Vec<String>,
    pub cultural_tags: Vec<String>,
    pub location_quality_score: Option<f64>,
    pub cultural_richness: Option<f64>,
    pub wikipedia_page_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointOfInterest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub distance_miles: Option<f64>,
    pub significance_score: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_document() {
        let doc: PropertyDocument = serde_json::from_value(json!({"listing_id": "prop-1"})).unwrap();
        assert_eq!(doc.listing_id, "prop-1");
        assert!(doc.features.is_empty());
        assert!(doc.address.is_none());
    }

    #[test]
    fn test_enriched_document() {
        let doc: PropertyDocument = serde_json::from_value(json!({
            "listing_id": "prop-2",
            "price": 725000,
            "bedrooms": 3,
            "bathrooms": 2.5,
            "address": {
                "city": "Park City",
                "state": "UT",
                "location": {"lat": 40.6461, "lon": -111.4980}
            },
            "parking": {"spaces": 2, "type": "garage"},
            "nearby_poi": [{"name": "Kimball Art Center", "category": "museum", "significance_score": 0.8}]
        }))
        .unwrap();

        assert_eq!(doc.price, Some(725_000.0));
        assert_eq!(doc.parking.unwrap().parking_type.as_deref(), Some("garage"));
        assert_eq!(doc.nearby_poi.len(), 1);
        assert_eq!(doc.address.unwrap().location.unwrap().lat, 40.6461);
    }

    #[test]
    fn test_corrupt_document_rejected() {
        let result: Result<PropertyDocument, _> =
            serde_json::from_value(json!({"listing_id": "prop-3", "price": "expensive"}));
        assert!(result.is_err());

        let result: Result<PropertyDocument, _> = serde_json::from_value(json!({"price": 1}));
        assert!(result.is_err());
    }
}
