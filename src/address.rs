//! The normalized postal-address model and its JSON mapping to the
//! [schema.org PostalAddress](https://schema.org/PostalAddress) vocabulary.
//!
//! An [`Address`](struct.Address.html) owns up to three
//! [`Coordinate`](../coordinate/struct.Coordinate.html)s: the centre of the
//! geocoded location plus the north-east and south-west corners of its
//! bounding box. String fields are all optional; an absent field round-trips
//! through JSON as an absent key, never as an empty string.

use serde_json::{Map, Value};

use crate::coordinate::{Coordinate, TYPE_KEY};
use crate::country_codes;

pub(crate) const ADDRESS_KEY: &str = "Address";
pub(crate) const LOCATION_KEY: &str = "location";
pub(crate) const CENTRE_KEY: &str = "location";
pub(crate) const NORTH_EAST_KEY: &str = "north_east_bound";
pub(crate) const SOUTH_WEST_KEY: &str = "south_west_bound";

const POSTAL_ADDRESS_TYPE: &str = "PostalAddress";
const NAME_KEY: &str = "name";
const STREET_KEY: &str = "streetAddress";
const LOCALITY_KEY: &str = "addressLocality";
const REGION_KEY: &str = "addressRegion";
const COUNTRY_KEY: &str = "addressCountry";
const POSTCODE_KEY: &str = "postalCode";

/// A postal address with optional geocoded coordinates.
///
/// `raw_gps` is a free-text decimal "lat, lon" shortcut: when it parses, the
/// geocoder uses it directly instead of querying any provider.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Address {
    pub name: Option<String>,
    pub street: Option<String>,
    pub town: Option<String>,
    pub county: Option<String>,
    pub country: Option<String>,
    pub postcode: Option<String>,
    /// ISO 3166-1 alpha-2 code.
    pub country_code: Option<String>,
    pub raw_gps: Option<String>,
    pub(crate) centre: Option<Coordinate>,
    pub(crate) north_east: Option<Coordinate>,
    pub(crate) south_west: Option<Coordinate>,
}

impl Address {
    pub fn new() -> Self {
        Address::default()
    }

    /// Release all fields and coordinates, resetting to empty.
    pub fn clear(&mut self) {
        *self = Address::default();
    }

    pub fn centre(&self) -> Option<&Coordinate> {
        self.centre.as_ref()
    }

    pub fn north_east(&self) -> Option<&Coordinate> {
        self.north_east.as_ref()
    }

    pub fn south_west(&self) -> Option<&Coordinate> {
        self.south_west.as_ref()
    }

    /// Set the centre coordinate, overwriting any existing one in place.
    pub fn set_centre(&mut self, latitude: f64, longitude: f64, elevation: Option<f64>) {
        set_coordinate(&mut self.centre, latitude, longitude, elevation);
    }

    /// Set the north-east bounding-box corner.
    pub fn set_north_east(&mut self, latitude: f64, longitude: f64, elevation: Option<f64>) {
        set_coordinate(&mut self.north_east, latitude, longitude, elevation);
    }

    /// Set the south-west bounding-box corner.
    pub fn set_south_west(&mut self, latitude: f64, longitude: f64, elevation: Option<f64>) {
        set_coordinate(&mut self.south_west, latitude, longitude, elevation);
    }

    /// Join name, street, town, county, country and postcode with `sep`,
    /// skipping absent fields. Used for diagnostic display and as the
    /// free-text form of a query.
    pub fn to_delimited_string(&self, sep: &str) -> String {
        let fields = [
            &self.name,
            &self.street,
            &self.town,
            &self.county,
            &self.country,
            &self.postcode,
        ];
        let mut joined = String::new();
        for value in fields.iter().filter_map(|f| f.as_deref()) {
            if !joined.is_empty() {
                joined.push_str(sep);
            }
            joined.push_str(value);
        }
        joined
    }

    /// Serialize as a JSON object holding the `"Address"` and `"location"`
    /// keys.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        self.write_json_into(&mut obj);
        Value::Object(obj)
    }

    /// Merge the `"Address"` and `"location"` keys into an existing object,
    /// so an address can be one field of a larger record.
    ///
    /// The `"Address"` sub-object is only emitted when at least one of town,
    /// county, country or postcode is present; otherwise it is omitted
    /// entirely rather than written as an empty object.
    pub fn write_json_into(&self, dest: &mut Map<String, Value>) {
        if let Some(postal) = self.postal_address_json() {
            dest.insert(ADDRESS_KEY.to_string(), postal);
        }

        let mut location = Map::new();
        if let Some(centre) = &self.centre {
            location.insert(CENTRE_KEY.to_string(), centre.to_json());
        }
        if let Some(north_east) = &self.north_east {
            location.insert(NORTH_EAST_KEY.to_string(), north_east.to_json());
        }
        if let Some(south_west) = &self.south_west {
            location.insert(SOUTH_WEST_KEY.to_string(), south_west.to_json());
        }
        dest.insert(LOCATION_KEY.to_string(), Value::Object(location));
    }

    /// Reconstruct an address from the JSON shape produced by
    /// [`to_json`](#method.to_json).
    ///
    /// Requires the `"PostalAddress"`-typed `"Address"` sub-object; returns
    /// `None` when it is absent or of the wrong type. The country code is
    /// derived from the country name via the lookup table, and any location
    /// sub-objects that parse are applied to the coordinates.
    pub fn from_json(value: &Value) -> Option<Self> {
        let postal = value.get(ADDRESS_KEY)?;
        if postal.get(TYPE_KEY)?.as_str()? != POSTAL_ADDRESS_TYPE {
            return None;
        }

        let country = string_field(postal, COUNTRY_KEY);
        let country_code = country
            .as_deref()
            .and_then(country_codes::code_from_name)
            .map(str::to_string);

        let mut address = Address {
            name: string_field(postal, NAME_KEY),
            street: string_field(postal, STREET_KEY),
            town: string_field(postal, LOCALITY_KEY),
            county: string_field(postal, REGION_KEY),
            country,
            postcode: string_field(postal, POSTCODE_KEY),
            country_code,
            ..Address::default()
        };

        if let Some(location) = value.get(LOCATION_KEY) {
            if let Some(coord) = parse_corner(location, CENTRE_KEY) {
                address.set_centre(coord.latitude, coord.longitude, coord.elevation());
            }
            if let Some(coord) = parse_corner(location, NORTH_EAST_KEY) {
                address.set_north_east(coord.latitude, coord.longitude, coord.elevation());
            }
            if let Some(coord) = parse_corner(location, SOUTH_WEST_KEY) {
                address.set_south_west(coord.latitude, coord.longitude, coord.elevation());
            }
        }

        Some(address)
    }

    fn postal_address_json(&self) -> Option<Value> {
        if self.town.is_none()
            && self.county.is_none()
            && self.country.is_none()
            && self.postcode.is_none()
        {
            return None;
        }

        let mut postal = Map::new();
        postal.insert(TYPE_KEY.to_string(), Value::from(POSTAL_ADDRESS_TYPE));
        add_present_field(&mut postal, NAME_KEY, &self.name);
        add_present_field(&mut postal, STREET_KEY, &self.street);
        add_present_field(&mut postal, LOCALITY_KEY, &self.town);
        add_present_field(&mut postal, REGION_KEY, &self.county);
        add_present_field(&mut postal, COUNTRY_KEY, &self.country);
        add_present_field(&mut postal, POSTCODE_KEY, &self.postcode);
        Some(Value::Object(postal))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_delimited_string(", "))
    }
}

fn set_coordinate(
    slot: &mut Option<Coordinate>,
    latitude: f64,
    longitude: f64,
    elevation: Option<f64>,
) {
    match slot {
        Some(coord) => {
            coord.latitude = latitude;
            coord.longitude = longitude;
            match elevation {
                Some(elevation) => coord.set_elevation(elevation),
                None => coord.clear_elevation(),
            }
        }
        None => {
            let mut coord = Coordinate::new(latitude, longitude);
            if let Some(elevation) = elevation {
                coord.set_elevation(elevation);
            }
            *slot = Some(coord);
        }
    }
}

fn add_present_field(obj: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        obj.insert(key.to_string(), Value::from(value.as_str()));
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_corner(location: &Value, key: &str) -> Option<Coordinate> {
    location
        .get(key)
        .and_then(|coord_json| Coordinate::from_json(coord_json).ok())
}
