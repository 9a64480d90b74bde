//! Raw row to search document mapping
//!
//! Column positions are fixed by the export format of the place dataset and
//! are not configurable.

use geoload_common::types::{GeoPoint, PlaceDocument};
use geoload_common::{GeoloadError, Result};
use regex::Regex;

use crate::source::RawRecord;

/// Positional layout of the place export.
pub mod columns {
    pub const ID: usize = 0;
    pub const ADDRESS: usize = 3;
    pub const CITY: usize = 4;
    pub const COUNTRY: usize = 5;
    pub const DISTRICT: usize = 6;
    pub const DIVISION: usize = 7;
    pub const IS_AUTOCOMPLETE: usize = 8;
    pub const LATLNG: usize = 9;
    pub const PLACE_ID: usize = 10;
    pub const PLUS_CODE: usize = 11;
    pub const POSTAL_CODE: usize = 12;
    pub const TYPES: usize = 13;

    /// Narrowest row the layout can be read from
    pub const MIN_WIDTH: usize = TYPES + 1;
}

/// Separator of the multi-valued `types` column
pub const TYPES_DELIMITER: char = ';';

/// WKT point, longitude first. Both coordinates may be signed.
const POINT_PATTERN: &str = r"^POINT \((-?\d+(?:\.\d*)?) (-?\d+(?:\.\d*)?)\)$";

/// A document ready for the batch, with the identifier it is indexed under.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedRecord {
    pub id: String,
    pub document: PlaceDocument,
}

/// Maps raw rows to [`PlaceDocument`]s.
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    point: Regex,
}

impl RecordTransformer {
    pub fn new() -> Result<Self> {
        let point = Regex::new(POINT_PATTERN)
            .map_err(|e| GeoloadError::config(format!("invalid geometry pattern: {e}")))?;
        Ok(Self { point })
    }

    /// Transform one row. Fails on short rows and unparseable geometry.
    pub fn transform(&self, record: &RawRecord) -> Result<TransformedRecord> {
        if record.len() < columns::MIN_WIDTH {
            return Err(GeoloadError::MalformedRow {
                line: record.line(),
                raw: record.raw(),
                reason: format!(
                    "expected at least {} fields, found {}",
                    columns::MIN_WIDTH,
                    record.len()
                ),
            });
        }

        let field = |index: usize| record.get(index).unwrap_or_default().to_string();

        let document = PlaceDocument {
            place_id: field(columns::PLACE_ID),
            address: field(columns::ADDRESS),
            latlng: self.parse_point(record.get(columns::LATLNG).unwrap_or_default())?,
            types: split_types(record.get(columns::TYPES).unwrap_or_default()),
            is_autocomplete_address: parse_flag(
                record.get(columns::IS_AUTOCOMPLETE).unwrap_or_default(),
            ),
            country: field(columns::COUNTRY),
            city: field(columns::CITY),
            division: field(columns::DIVISION),
            district: field(columns::DISTRICT),
            postal_code: field(columns::POSTAL_CODE),
            plus_code: field(columns::PLUS_CODE),
        };

        Ok(TransformedRecord {
            id: field(columns::ID),
            document,
        })
    }

    /// Parse `POINT (<lon> <lat>)` into a lat/lon point.
    pub fn parse_point(&self, value: &str) -> Result<GeoPoint> {
        let invalid = || GeoloadError::parse("latlng", value);

        let caps = self.point.captures(value).ok_or_else(invalid)?;
        if caps.len() != 3 {
            return Err(invalid());
        }

        let lon: f64 = caps[1].parse().map_err(|_| invalid())?;
        let lat: f64 = caps[2].parse().map_err(|_| invalid())?;
        Ok(GeoPoint::new(lat, lon))
    }
}

/// Only the exact literal `true` is true.
pub fn parse_flag(value: &str) -> bool {
    value == "true"
}

/// Split the `types` column. An empty column yields one empty entry.
pub fn split_types(value: &str) -> Vec<String> {
    value.split(TYPES_DELIMITER).map(str::to_string).collect()
}

/// Identifier of a raw row, used to match the resume checkpoint.
pub fn record_id(record: &RawRecord) -> &str {
    record.get(columns::ID).unwrap_or_default()
}
