//! The Google-style geocoding provider.
//!
//! Two query strategies are supported: the primary free-text `address=`
//! form built from the postal fields, and a fallback `components=` form
//! keyed on postcode and country, used when the free-text query yields an
//! empty result. Responses carry a `status` string which drives the
//! success / no-result / denied classification; see the
//! [API documentation](https://developers.google.com/maps/documentation/geocoding)
//! for details.

use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::address::Address;
use crate::country_codes;
use crate::request::{append_escaped_field, FieldAppend};
use crate::Outcome;

/// Build the primary free-text query: `&address=` followed by name, street,
/// town, county and country, URL-escaped and comma-space joined, skipping
/// absent components. The country name falls back to a code lookup when only
/// a country code is present. Returns `None` when there is nothing to query.
pub(crate) fn build_address_query(base_url: &str, address: &Address) -> Option<String> {
    let mut url = base_url.to_string();
    let mut prefix = "&address=";
    let mut appended = false;

    for value in [&address.name, &address.street, &address.town, &address.county].iter() {
        if append_escaped_field(&mut url, value.as_deref(), prefix) == FieldAppend::Appended {
            prefix = ",%20";
            appended = true;
        }
    }

    let country = address
        .country
        .as_deref()
        .or_else(|| address.country_code.as_deref().and_then(country_codes::name_from_code));
    if append_escaped_field(&mut url, country, prefix) == FieldAppend::Appended {
        appended = true;
    }

    if appended {
        Some(url)
    } else {
        None
    }
}

/// Build the fallback query: `&components=postal_code:<postcode>|country:<code>`.
/// Only available when a postcode is present; the country part is added when
/// a code can be resolved.
pub(crate) fn build_components_query(base_url: &str, address: &Address) -> Option<String> {
    let postcode = address.postcode.as_deref()?.trim_start();
    if postcode.is_empty() {
        return None;
    }

    let mut url = base_url.to_string();
    url.push_str("&components=postal_code:");
    url.push_str(&urlencoding::encode(postcode));

    if let Some(code) = resolve_country_code(address) {
        url.push_str("|country:");
        url.push_str(code);
    }

    Some(url)
}

/// Prefer an explicit, valid country code; otherwise derive one from the
/// country name. A country name of "UK" is normalized to "GB" first, since
/// the canonical table does not carry the colloquial form.
fn resolve_country_code(address: &Address) -> Option<&str> {
    if let Some(code) = address.country_code.as_deref() {
        if country_codes::is_valid_code(code) {
            return Some(code);
        }
    }

    let name = address.country.as_deref()?;
    let name = if name == "UK" { "GB" } else { name };
    if country_codes::is_valid_code(name) {
        Some(name)
    } else {
        country_codes::code_from_name(name)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Option<LatLng>,
    viewport: Option<Value>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Classify a parsed response and, on success, fill in the address
/// coordinates from the first result whose geometry parses.
///
/// `"OK"` with a usable result is a match, `"ZERO_RESULTS"` is a well-formed
/// empty result, and every other status (quota, denial, invalid request,
/// server error) is a hard failure that the dispatcher never retries.
pub(crate) fn parse_response(address: &mut Address, tree: &Value) -> Outcome {
    let response = match GoogleResponse::deserialize(tree) {
        Ok(response) => response,
        Err(err) => {
            warn!("malformed google geocoder response: {}", err);
            return Outcome::Failed;
        }
    };

    match response.status.as_str() {
        "OK" => {
            for result in &response.results {
                let result = match GoogleResult::deserialize(result) {
                    Ok(result) => result,
                    Err(err) => {
                        warn!("skipping unparseable google result: {}", err);
                        continue;
                    }
                };
                if apply_result(address, &result) {
                    return Outcome::Found;
                }
            }
            Outcome::NoMatch
        }
        "ZERO_RESULTS" => Outcome::NoMatch,
        status => {
            warn!("google geocoder reported \"{}\"", status);
            Outcome::Failed
        }
    }
}

/// Set the centre from `geometry.location` and, when a viewport is present,
/// the bounding-box corners. A centre is required; bounds are best-effort
/// and a corner that fails to parse is logged without failing the result.
fn apply_result(address: &mut Address, result: &GoogleResult) -> bool {
    let geometry = match &result.geometry {
        Some(geometry) => geometry,
        None => return false,
    };
    let centre = match geometry.location {
        Some(centre) => centre,
        None => return false,
    };

    address.set_centre(centre.lat, centre.lng, None);

    if let Some(viewport) = &geometry.viewport {
        apply_corner(address, viewport, "northeast", Address::set_north_east);
        apply_corner(address, viewport, "southwest", Address::set_south_west);
    }

    true
}

fn apply_corner<F>(address: &mut Address, viewport: &Value, key: &str, set: F)
where
    F: Fn(&mut Address, f64, f64, Option<f64>),
{
    if let Some(corner) = viewport.get(key) {
        match LatLng::deserialize(corner) {
            Ok(corner) => set(address, corner.lat, corner.lng, None),
            Err(err) => warn!("failed to set {} bound from google viewport: {}", key, err),
        }
    }
}
