//! Document types sent to the search index

use serde::{Deserialize, Serialize};

/// Geographic point in the index's `geo_point` object form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// One geocoded place, as stored in the index.
///
/// The record identifier is not part of the body; it travels as the `_id`
/// of the [`BulkAction`] that precedes the document on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceDocument {
    pub place_id: String,
    pub address: String,
    pub latlng: GeoPoint,
    pub types: Vec<String>,
    pub is_autocomplete_address: bool,
    pub country: String,
    pub city: String,
    pub division: String,
    pub district: String,
    pub postal_code: String,
    pub plus_code: String,
}

/// Action line of a `_bulk` request.
///
/// Only the `index` operation is produced: it creates the document or
/// replaces the existing one with the same `_id`, so resending a batch is
/// harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAction {
    pub index: BulkTarget,
}

/// Target of a bulk action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkTarget {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
}

impl BulkAction {
    /// Upsert `id` into `index`
    pub fn upsert(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            index: BulkTarget {
                index: index.into(),
                id: id.into(),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.index.id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_action_wire_format() {
        let action = BulkAction::upsert("places", "42");
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(json, r#"{"index":{"_index":"places","_id":"42"}}"#);
        assert_eq!(action.id(), "42");
    }

    #[test]
    fn test_place_document_uses_camel_case_keys() {
        let doc = PlaceDocument {
            place_id: "ChIJ123".to_string(),
            address: "1 Main St".to_string(),
            latlng: GeoPoint::new(56.78, 12.34),
            types: vec!["street_address".to_string()],
            is_autocomplete_address: true,
            country: "SE".to_string(),
            city: "Lund".to_string(),
            division: "Skane".to_string(),
            district: "Centrum".to_string(),
            postal_code: "22100".to_string(),
            plus_code: "9F000000+00".to_string(),
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["placeId"], "ChIJ123");
        assert_eq!(value["isAutocompleteAddress"], true);
        assert_eq!(value["postalCode"], "22100");
        assert_eq!(value["plusCode"], "9F000000+00");
        assert_eq!(value["latlng"]["lat"], 56.78);
        assert_eq!(value["latlng"]["lon"], 12.34);
        assert!(value.get("id").is_none());
    }
}
