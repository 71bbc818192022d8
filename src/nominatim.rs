//! The [OpenStreetMap Nominatim](https://nominatim.org/) provider.
//!
//! The primary forward query uses Nominatim's structured search parameters;
//! the fallback is the free-text `q=` form. Forward responses are a bare
//! JSON array of results with string-encoded coordinates, and the
//! `boundingbox` field follows the
//! [documented](https://nominatim.org/release-docs/develop/api/Output/)
//! `[min_lat, max_lat, min_lon, max_lon]` ordering. Reverse geocoding uses
//! the `reverse` endpoint with `addressdetails=1`.
//!
//! Nominatim's public instance is rate-limited to 1 request per second; see
//! the [usage policy](https://operations.osmfoundation.org/policies/nominatim/).

use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::address::Address;
use crate::coordinate::Coordinate;
use crate::request::{append_escaped_field, FieldAppend};
use crate::Outcome;

/// Build the structured search query. Each of `street`, `city`, `county`,
/// `country` (as a code) and `postalcode` is emitted only when non-blank
/// after trimming leading whitespace; the first emitted parameter is
/// prefixed with `?`, the rest with `&`. Returns `None` when no parameter
/// could be emitted.
pub(crate) fn build_structured_query(base_url: &str, address: &Address) -> Option<String> {
    let params = [
        ("street", &address.street),
        ("city", &address.town),
        ("county", &address.county),
        ("country", &address.country_code),
        ("postalcode", &address.postcode),
    ];

    let mut url = base_url.to_string();
    let mut first = true;

    for (key, value) in params.iter() {
        let value = value
            .as_deref()
            .map(str::trim_start)
            .filter(|v| !v.is_empty());
        let prefix = format!("{}{}=", if first { '?' } else { '&' }, key);
        if append_escaped_field(&mut url, value, &prefix) == FieldAppend::Appended {
            first = false;
        }
    }

    if first {
        return None;
    }

    url.push_str("&format=json");
    Some(url)
}

/// Build the free-text fallback query: `?q=` followed by name, street, town,
/// county and country joined comma-space, in the same form as the
/// Google-style primary query.
pub(crate) fn build_freetext_query(base_url: &str, address: &Address) -> Option<String> {
    let mut url = base_url.to_string();
    let mut prefix = "?q=";
    let mut appended = false;

    let fields = [
        &address.name,
        &address.street,
        &address.town,
        &address.county,
        &address.country,
    ];
    for value in fields.iter() {
        if append_escaped_field(&mut url, value.as_deref(), prefix) == FieldAppend::Appended {
            prefix = ",%20";
            appended = true;
        }
    }

    if !appended {
        return None;
    }

    url.push_str("&format=json");
    Some(url)
}

/// Build the reverse-lookup URL from an address's centre coordinate.
pub(crate) fn build_reverse_query(base_url: &str, centre: &Coordinate) -> String {
    format!(
        "{}?format=json&lat={}&lon={}&addressdetails=1",
        base_url, centre.latitude, centre.longitude
    )
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    boundingbox: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<ReverseAddress>,
}

#[derive(Debug, Deserialize)]
struct ReverseAddress {
    street: Option<String>,
    city: Option<String>,
    county: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
    postcode: Option<String>,
}

/// Classify a forward-search response: anything that is not an array is a
/// no-result, and the first element whose coordinates (and bounding box,
/// when present) fully parse supplies the location.
pub(crate) fn parse_search_response(address: &mut Address, tree: &Value) -> Outcome {
    let results = match tree.as_array() {
        Some(results) => results,
        None => return Outcome::NoMatch,
    };

    for element in results {
        let result = match SearchResult::deserialize(element) {
            Ok(result) => result,
            Err(err) => {
                warn!("skipping unparseable nominatim result: {}", err);
                continue;
            }
        };

        let latitude = match result.lat.trim().parse::<f64>() {
            Ok(latitude) => latitude,
            Err(_) => continue,
        };
        let longitude = match result.lon.trim().parse::<f64>() {
            Ok(longitude) => longitude,
            Err(_) => continue,
        };

        // A malformed bounding box rejects the whole element; an absent one
        // leaves the centre as the only location data.
        let bounds = match &result.boundingbox {
            Some(values) => match parse_bounding_box(values) {
                Some(bounds) => Some(bounds),
                None => {
                    warn!("rejecting nominatim result with malformed boundingbox");
                    continue;
                }
            },
            None => None,
        };

        address.set_centre(latitude, longitude, None);
        if let Some([min_lat, max_lat, min_lon, max_lon]) = bounds {
            address.set_north_east(max_lat, max_lon, None);
            address.set_south_west(min_lat, min_lon, None);
        }
        return Outcome::Found;
    }

    Outcome::NoMatch
}

/// Parse the four string-encoded decimals of a `boundingbox` as
/// `[min_lat, max_lat, min_lon, max_lon]`.
fn parse_bounding_box(values: &[String]) -> Option<[f64; 4]> {
    if values.len() != 4 {
        return None;
    }
    let mut parsed = [0.0; 4];
    for (slot, value) in parsed.iter_mut().zip(values) {
        *slot = value.trim().parse().ok()?;
    }
    Some(parsed)
}

/// Merge the `address` sub-object of a reverse-lookup response into the
/// postal fields. Fields absent from the response leave the existing values
/// untouched.
pub(crate) fn parse_reverse_response(address: &mut Address, tree: &Value) -> Outcome {
    let response = match ReverseResponse::deserialize(tree) {
        Ok(response) => response,
        Err(err) => {
            warn!("malformed nominatim reverse response: {}", err);
            return Outcome::Failed;
        }
    };

    let details = match response.address {
        Some(details) => details,
        None => return Outcome::NoMatch,
    };

    merge_field(&mut address.street, details.street);
    merge_field(&mut address.town, details.city);
    merge_field(&mut address.county, details.county);
    merge_field(&mut address.country, details.country);
    merge_field(&mut address.country_code, details.country_code);
    merge_field(&mut address.postcode, details.postcode);

    Outcome::Found
}

fn merge_field(existing: &mut Option<String>, incoming: Option<String>) {
    if incoming.is_some() {
        *existing = incoming;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_query_prefixes_and_escaping() {
        let address = Address {
            street: Some("Colney Lane".to_string()),
            town: Some("Norwich".to_string()),
            country_code: Some("GB".to_string()),
            postcode: Some("NR4 7UG".to_string()),
            ..Address::default()
        };
        let url = build_structured_query("http://osm/search", &address).unwrap();
        assert_eq!(
            url,
            "http://osm/search?street=Colney%20Lane&city=Norwich&country=GB&postalcode=NR4%207UG&format=json"
        );
    }

    #[test]
    fn structured_query_skips_blank_fields() {
        let address = Address {
            street: Some("   ".to_string()),
            town: Some("  Norwich".to_string()),
            ..Address::default()
        };
        let url = build_structured_query("http://osm/search", &address).unwrap();
        assert_eq!(url, "http://osm/search?city=Norwich&format=json");

        assert!(build_structured_query("http://osm/search", &Address::new()).is_none());
    }

    #[test]
    fn freetext_query_joins_components() {
        let address = Address {
            town: Some("Norwich".to_string()),
            country: Some("United Kingdom".to_string()),
            ..Address::default()
        };
        let url = build_freetext_query("http://osm/search", &address).unwrap();
        assert_eq!(
            url,
            "http://osm/search?q=Norwich,%20United%20Kingdom&format=json"
        );
    }

    #[test]
    fn reverse_query_carries_centre() {
        let centre = Coordinate::new(52.6216, 1.2187);
        assert_eq!(
            build_reverse_query("http://osm/reverse", &centre),
            "http://osm/reverse?format=json&lat=52.6216&lon=1.2187&addressdetails=1"
        );
    }

    #[test]
    fn search_response_sets_centre_and_bounds() {
        let tree = json!([{
            "lat": "51.5",
            "lon": "-0.12",
            "boundingbox": ["51.3", "51.6", "-0.3", "0.0"]
        }]);
        let mut address = Address::new();
        assert_eq!(parse_search_response(&mut address, &tree), Outcome::Found);
        assert_eq!(address.centre().unwrap().latitude, 51.5);
        assert_eq!(address.centre().unwrap().longitude, -0.12);
        // north-east = (max_lat, max_lon), south-west = (min_lat, min_lon)
        assert_eq!(address.north_east().unwrap().latitude, 51.6);
        assert_eq!(address.north_east().unwrap().longitude, 0.0);
        assert_eq!(address.south_west().unwrap().latitude, 51.3);
        assert_eq!(address.south_west().unwrap().longitude, -0.3);
    }

    #[test]
    fn malformed_boundingbox_rejects_element() {
        let tree = json!([
            { "lat": "1.0", "lon": "2.0", "boundingbox": ["0.5", "oops", "1.5", "2.5"] },
            { "lat": "3.0", "lon": "4.0" }
        ]);
        let mut address = Address::new();
        assert_eq!(parse_search_response(&mut address, &tree), Outcome::Found);
        assert_eq!(address.centre().unwrap().latitude, 3.0);
        assert!(address.north_east().is_none());
    }

    #[test]
    fn empty_or_non_array_responses_are_no_match() {
        let mut address = Address::new();
        assert_eq!(parse_search_response(&mut address, &json!([])), Outcome::NoMatch);
        assert_eq!(
            parse_search_response(&mut address, &json!({ "error": "Unable to geocode" })),
            Outcome::NoMatch
        );
        assert!(address.centre().is_none());
    }

    #[test]
    fn reverse_response_merges_fields() {
        let mut address = Address {
            street: Some("Colney Lane".to_string()),
            town: Some("old town".to_string()),
            ..Address::default()
        };
        let tree = json!({
            "address": {
                "city": "Norwich",
                "county": "Norfolk",
                "country": "United Kingdom",
                "country_code": "gb",
                "postcode": "NR4 7UG"
            }
        });
        assert_eq!(parse_reverse_response(&mut address, &tree), Outcome::Found);
        assert_eq!(address.town.as_deref(), Some("Norwich"));
        assert_eq!(address.county.as_deref(), Some("Norfolk"));
        assert_eq!(address.postcode.as_deref(), Some("NR4 7UG"));
        // absent in the response, so left alone
        assert_eq!(address.street.as_deref(), Some("Colney Lane"));
    }

    #[test]
    fn reverse_response_without_address_is_no_match() {
        let mut address = Address::new();
        let tree = json!({ "error": "Unable to geocode" });
        assert_eq!(parse_reverse_response(&mut address, &tree), Outcome::NoMatch);
    }
}
