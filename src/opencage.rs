//! The [OpenCage Geocoding](https://opencagedata.com/) provider.
//!
//! A single free-text query strategy: the postal components joined with
//! `+`-for-space escaping, plus a `countrycode=` restriction when a country
//! code is available. Note that rate limits and a daily quota apply to the
//! free tier; a quota refusal is surfaced through the response `status`
//! object and classified as a hard failure, distinct from an empty result.
//! Please see the [API documentation](https://opencagedata.com/api) for
//! details.

use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::address::Address;
use crate::country_codes;
use crate::Outcome;

/// Build the forward query: `&query=` followed by name, street, town and
/// county, comma-joined with spaces encoded as `+`, then `&countrycode=`
/// when a code is available (an explicit valid code, else one derived from
/// the country name). Returns `None` when there is nothing to query.
pub(crate) fn build_query(base_url: &str, address: &Address) -> Option<String> {
    let mut url = base_url.to_string();
    let mut appended = false;

    let fields = [&address.name, &address.street, &address.town, &address.county];
    for value in fields.iter() {
        if let Some(value) = value.as_deref() {
            url.push_str(if appended { ",+" } else { "&query=" });
            url.push_str(&escaped_component(value));
            appended = true;
        }
    }

    if !appended {
        return None;
    }

    let code = match address.country_code.as_deref() {
        Some(code) if country_codes::is_valid_code(code) => Some(code),
        Some(_) => address.country.as_deref().and_then(country_codes::code_from_name),
        None => None,
    };
    if let Some(code) = code {
        url.push_str("&countrycode=");
        url.push_str(code);
    }

    Some(url)
}

fn escaped_component(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

#[derive(Debug, Deserialize)]
struct OpencageResponse {
    #[serde(default)]
    results: Vec<Value>,
    status: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct Status {
    code: i32,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    geometry: Option<LatLng>,
    bounds: Option<Bounds>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct Bounds {
    northeast: Option<LatLng>,
    southwest: Option<LatLng>,
}

/// Classify a response and apply the first candidate whose geometry parses.
/// A provider-reported non-200 status (quota exhausted, key refused) is a
/// hard failure; an empty candidate list is a no-result.
pub(crate) fn parse_response(address: &mut Address, tree: &Value) -> Outcome {
    let response = match OpencageResponse::deserialize(tree) {
        Ok(response) => response,
        Err(err) => {
            warn!("malformed opencage response: {}", err);
            return Outcome::Failed;
        }
    };

    if let Some(status) = &response.status {
        if status.code != 200 {
            warn!(
                "opencage reported {}: {}",
                status.code,
                status.message.as_deref().unwrap_or("no message")
            );
            return Outcome::Failed;
        }
    }

    for candidate in &response.results {
        let candidate = match Candidate::deserialize(candidate) {
            Ok(candidate) => candidate,
            Err(err) => {
                warn!("skipping unparseable opencage result: {}", err);
                continue;
            }
        };
        let centre = match candidate.geometry {
            Some(centre) => centre,
            None => continue,
        };

        address.set_centre(centre.lat, centre.lng, None);

        if let Some(bounds) = &candidate.bounds {
            if let Some(north_east) = bounds.northeast {
                address.set_north_east(north_east.lat, north_east.lng, None);
            }
            if let Some(south_west) = bounds.southwest {
                address.set_south_west(south_west.lat, south_west.lng, None);
            }
        }
        return Outcome::Found;
    }

    Outcome::NoMatch
}
