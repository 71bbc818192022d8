//! A latitude/longitude pair with an optional elevation, and its JSON
//! mapping to the [schema.org GeoCoordinates](https://schema.org/GeoCoordinates)
//! vocabulary.

use serde_json::{json, Map, Value};

use crate::GeocodingError;

pub(crate) const TYPE_KEY: &str = "@type";
pub(crate) const GEO_COORDINATES_TYPE: &str = "so:GeoCoordinates";
pub(crate) const LATITUDE_KEY: &str = "latitude";
pub(crate) const LONGITUDE_KEY: &str = "longitude";
pub(crate) const ELEVATION_KEY: &str = "elevation";

/// A geographic coordinate.
///
/// Latitude and longitude are decimal degrees; elevation, when set, is in
/// metres. No range validation is performed at construction, that is the
/// caller's concern. An unset location is represented by an absent
/// `Coordinate`, never by out-of-range marker values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    elevation: Option<f64>,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinate {
            latitude,
            longitude,
            elevation: None,
        }
    }

    pub fn elevation(&self) -> Option<f64> {
        self.elevation
    }

    /// Set or overwrite the elevation, in metres.
    pub fn set_elevation(&mut self, elevation: f64) {
        self.elevation = Some(elevation);
    }

    /// Remove the elevation; subsequent serialization omits it.
    pub fn clear_elevation(&mut self) {
        self.elevation = None;
    }

    /// Serialize as a `so:GeoCoordinates` JSON object.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(TYPE_KEY.to_string(), Value::from(GEO_COORDINATES_TYPE));
        obj.insert(LATITUDE_KEY.to_string(), json!(self.latitude));
        obj.insert(LONGITUDE_KEY.to_string(), json!(self.longitude));
        if let Some(elevation) = self.elevation {
            obj.insert(ELEVATION_KEY.to_string(), json!(elevation));
        }
        Value::Object(obj)
    }

    /// Reconstruct from a JSON object holding numeric `latitude` and
    /// `longitude` keys; `elevation` is optional.
    pub fn from_json(value: &Value) -> Result<Self, GeocodingError> {
        let latitude = required_number(value, LATITUDE_KEY)?;
        let longitude = required_number(value, LONGITUDE_KEY)?;
        let mut coord = Coordinate::new(latitude, longitude);

        match value.get(ELEVATION_KEY) {
            Some(elevation) => match elevation.as_f64() {
                Some(elevation) => coord.set_elevation(elevation),
                None => return Err(GeocodingError::InvalidField(ELEVATION_KEY)),
            },
            None => (),
        }

        Ok(coord)
    }
}

fn required_number(value: &Value, key: &'static str) -> Result<f64, GeocodingError> {
    match value.get(key) {
        Some(field) => field.as_f64().ok_or(GeocodingError::InvalidField(key)),
        None => Err(GeocodingError::MissingField(key)),
    }
}
