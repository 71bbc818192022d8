//! The geocoder tool: a provider bound to its endpoint URLs, dispatching
//! forward and reverse geocoding calls.
//!
//! A [`GeocoderTool`](struct.GeocoderTool.html) is read-only after
//! construction and may be shared across callers; each call performs at most
//! two sequential requests through the injected transport: the provider's
//! primary query and, when that yields a well-formed empty result, a single
//! retry with the provider's fallback query strategy. Hard failures are
//! never retried.

use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::address::Address;
use crate::request;
use crate::{google, nominatim, opencage};
use crate::{GeocodingError, Outcome, Transport};

/// The closed set of supported providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Google,
    Opencage,
    Nominatim,
    /// Declared but not implemented; geocoding through it always reports
    /// failure rather than silently succeeding.
    LocationIq,
}

impl Provider {
    /// Resolve a configured provider name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Provider> {
        if name.eq_ignore_ascii_case("google") {
            Some(Provider::Google)
        } else if name.eq_ignore_ascii_case("opencage") {
            Some(Provider::Opencage)
        } else if name.eq_ignore_ascii_case("nominatim") {
            Some(Provider::Nominatim)
        } else if name.eq_ignore_ascii_case("locationiq") {
            Some(Provider::LocationIq)
        } else {
            None
        }
    }
}

/// The geocoder section of the host application's configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct GeocoderConfig {
    /// Name of the entry to use, matched case-insensitively.
    pub default_geocoder: String,
    pub geocoders: Vec<GeocoderEntry>,
}

/// One configured geocoding service.
#[derive(Clone, Debug, Deserialize)]
pub struct GeocoderEntry {
    pub name: String,
    /// Base URL for forward geocoding, typically already carrying the API
    /// key where the provider needs one.
    pub uri: String,
    #[serde(default)]
    pub reverse_uri: Option<String>,
}

/// A provider resolved together with its endpoint URLs.
#[derive(Clone, Debug)]
pub struct GeocoderTool {
    provider: Provider,
    geocode_url: String,
    reverse_geocode_url: Option<String>,
}

impl GeocoderTool {
    pub fn new(
        provider: Provider,
        geocode_url: impl Into<String>,
        reverse_geocode_url: Option<String>,
    ) -> Self {
        GeocoderTool {
            provider,
            geocode_url: geocode_url.into(),
            reverse_geocode_url,
        }
    }

    /// Resolve the configured default geocoder into a tool.
    pub fn from_config(config: &GeocoderConfig) -> Result<Self, GeocodingError> {
        let entry = config
            .geocoders
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(&config.default_geocoder))
            .ok_or_else(|| GeocodingError::UnknownGeocoder(config.default_geocoder.clone()))?;

        let provider = Provider::from_name(&entry.name)
            .ok_or_else(|| GeocodingError::UnknownProvider(entry.name.clone()))?;

        Ok(GeocoderTool::new(
            provider,
            entry.uri.clone(),
            entry.reverse_uri.clone(),
        ))
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Determine the geographic coordinates for `address`.
    ///
    /// When the address carries a parseable decimal "lat, lon" raw-GPS
    /// string the centre is set from it directly and no provider is
    /// consulted, whichever provider is configured. Otherwise the provider's
    /// primary query is issued and, on a well-formed empty result only,
    /// retried once with its fallback strategy.
    ///
    /// Returns `true` iff a centre coordinate was obtained.
    pub fn geocode(&self, address: &mut Address, transport: &dyn Transport) -> bool {
        if let Some(raw) = address.raw_gps.clone() {
            if let Some((latitude, longitude)) = parse_decimal_pair(&raw) {
                address.set_centre(latitude, longitude, None);
                return true;
            }
            warn!("ignoring unparseable raw GPS text \"{}\"", raw);
        }

        let outcome = match self.provider {
            Provider::Google => self.geocode_with_fallback(
                address,
                transport,
                google::build_address_query,
                google::build_components_query,
                google::parse_response,
            ),
            Provider::Nominatim => self.geocode_with_fallback(
                address,
                transport,
                nominatim::build_structured_query,
                nominatim::build_freetext_query,
                nominatim::parse_search_response,
            ),
            Provider::Opencage => match opencage::build_query(&self.geocode_url, address) {
                Some(url) => request::invoke(transport, &url, address, opencage::parse_response),
                None => Outcome::NoMatch,
            },
            Provider::LocationIq => {
                warn!("LocationIQ geocoding is not implemented");
                Outcome::Failed
            }
        };

        outcome == Outcome::Found
    }

    /// Determine the postal address for an already-located `address`.
    ///
    /// Requires a centre coordinate and a configured reverse URL; fields
    /// present in the provider response overwrite the corresponding address
    /// fields, absent ones leave them untouched.
    pub fn reverse_geocode(&self, address: &mut Address, transport: &dyn Transport) -> bool {
        let centre = match address.centre() {
            Some(centre) => *centre,
            None => {
                warn!("reverse geocoding requires a centre coordinate");
                return false;
            }
        };
        let reverse_url = match &self.reverse_geocode_url {
            Some(url) => url,
            None => {
                warn!("no reverse geocoding URL configured for {:?}", self.provider);
                return false;
            }
        };

        let outcome = match self.provider {
            Provider::Nominatim => {
                let url = nominatim::build_reverse_query(reverse_url, &centre);
                request::invoke(transport, &url, address, nominatim::parse_reverse_response)
            }
            provider => {
                warn!("{:?} reverse geocoding is not implemented", provider);
                Outcome::Failed
            }
        };

        outcome == Outcome::Found
    }

    fn geocode_with_fallback(
        &self,
        address: &mut Address,
        transport: &dyn Transport,
        primary: fn(&str, &Address) -> Option<String>,
        fallback: fn(&str, &Address) -> Option<String>,
        parse: fn(&mut Address, &Value) -> Outcome,
    ) -> Outcome {
        let first = match primary(&self.geocode_url, address) {
            Some(url) => request::invoke(transport, &url, address, parse),
            None => Outcome::NoMatch,
        };
        if first != Outcome::NoMatch {
            return first;
        }

        match fallback(&self.geocode_url, address) {
            Some(url) => request::invoke(transport, &url, address, parse),
            None => Outcome::NoMatch,
        }
    }
}

/// Parse a decimal "lat, lon" pair, tolerating surrounding whitespace and at
/// most one trailing non-numeric separator character after the longitude.
fn parse_decimal_pair(text: &str) -> Option<(f64, f64)> {
    let comma = text.find(',')?;
    let latitude = text[..comma].trim().parse::<f64>().ok()?;

    let rest = text[comma + 1..]
        .trim_start_matches(|c: char| !c.is_ascii_digit() && c != '-' && c != '+')
        .trim_end();
    let rest = match rest.strip_suffix(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(stripped) => stripped.trim_end(),
        None => rest,
    };
    let longitude = rest.parse::<f64>().ok()?;

    Some((latitude, longitude))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{init_test_logger, TransportError};
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays canned response bodies in order, recording each requested URL.
    struct ScriptedTransport {
        responses: RefCell<VecDeque<String>>,
        urls: RefCell<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(responses: &[Value]) -> Self {
            ScriptedTransport {
                responses: RefCell::new(responses.iter().map(Value::to_string).collect()),
                urls: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.urls.borrow().len()
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, url: &str) -> Result<String, TransportError> {
            self.urls.borrow_mut().push(url.to_string());
            match self.responses.borrow_mut().pop_front() {
                Some(body) => Ok(body),
                None => panic!("unexpected transport call to {}", url),
            }
        }
    }

    /// Fails the test if the geocoder touches the network at all.
    struct NoCallTransport;

    impl Transport for NoCallTransport {
        fn get(&self, url: &str) -> Result<String, TransportError> {
            panic!("transport must not be called, got {}", url);
        }
    }

    fn google_tool() -> GeocoderTool {
        GeocoderTool::new(Provider::Google, "http://g/json?key=k", None)
    }

    fn nominatim_tool() -> GeocoderTool {
        GeocoderTool::new(
            Provider::Nominatim,
            "http://osm/search",
            Some("http://osm/reverse".to_string()),
        )
    }

    #[test]
    fn raw_gps_short_circuits_every_provider() {
        for provider in [
            Provider::Google,
            Provider::Opencage,
            Provider::Nominatim,
            Provider::LocationIq,
        ]
        .iter()
        {
            let tool = GeocoderTool::new(*provider, "http://unused", None);
            let mut address = Address {
                raw_gps: Some("32.4567, 12.1234".to_string()),
                town: Some("ignored".to_string()),
                ..Address::default()
            };
            assert!(tool.geocode(&mut address, &NoCallTransport));
            let centre = address.centre().unwrap();
            assert_eq!(centre.latitude, 32.4567);
            assert_eq!(centre.longitude, 12.1234);
        }
    }

    #[test]
    fn google_retries_with_components_on_empty_result() {
        init_test_logger();
        let transport = ScriptedTransport::new(&[
            json!({ "status": "ZERO_RESULTS" }),
            json!({
                "status": "OK",
                "results": [{ "geometry": { "location": { "lat": 52.6, "lng": 1.2 } } }]
            }),
        ]);
        let mut address = Address {
            town: Some("Norwich".to_string()),
            country: Some("United Kingdom".to_string()),
            postcode: Some("NR4 7UG".to_string()),
            ..Address::default()
        };

        assert!(google_tool().geocode(&mut address, &transport));
        assert_eq!(transport.calls(), 2);
        assert_eq!(address.centre().unwrap().latitude, 52.6);

        let urls = transport.urls.borrow();
        assert!(urls[0].contains("&address="));
        assert!(urls[1].contains("&components=postal_code:NR4%207UG"));
    }

    #[test]
    fn google_denial_is_not_retried() {
        init_test_logger();
        let transport = ScriptedTransport::new(&[json!({ "status": "REQUEST_DENIED" })]);
        let mut address = Address {
            town: Some("Norwich".to_string()),
            country: Some("United Kingdom".to_string()),
            postcode: Some("NR4 7UG".to_string()),
            ..Address::default()
        };

        assert!(!google_tool().geocode(&mut address, &transport));
        assert_eq!(transport.calls(), 1);
        assert!(address.centre().is_none());
    }

    #[test]
    fn google_without_primary_components_goes_straight_to_fallback() {
        let transport = ScriptedTransport::new(&[json!({
            "status": "OK",
            "results": [{ "geometry": { "location": { "lat": 48.1, "lng": 11.5 } } }]
        })]);
        // postcode only: nothing for the free-text query to work with
        let mut address = Address {
            postcode: Some("80331".to_string()),
            ..Address::default()
        };

        assert!(google_tool().geocode(&mut address, &transport));
        assert_eq!(transport.calls(), 1);
        assert!(transport.urls.borrow()[0].contains("&components=postal_code:80331"));
    }

    #[test]
    fn nominatim_sets_centre_and_bounds() {
        let transport = ScriptedTransport::new(&[json!([{
            "lat": "51.5",
            "lon": "-0.12",
            "boundingbox": ["51.3", "51.6", "-0.3", "0.0"]
        }])]);
        let mut address = Address {
            town: Some("London".to_string()),
            ..Address::default()
        };

        assert!(nominatim_tool().geocode(&mut address, &transport));
        assert_eq!(transport.calls(), 1);
        assert_eq!(address.centre().unwrap().latitude, 51.5);
        assert_eq!(address.north_east().unwrap().latitude, 51.6);
        assert_eq!(address.south_west().unwrap().longitude, -0.3);
    }

    #[test]
    fn nominatim_falls_back_to_freetext() {
        let transport = ScriptedTransport::new(&[
            json!([]),
            json!([{ "lat": "52.62", "lon": "1.22" }]),
        ]);
        let mut address = Address {
            town: Some("Norwich".to_string()),
            ..Address::default()
        };

        assert!(nominatim_tool().geocode(&mut address, &transport));
        assert_eq!(transport.calls(), 2);

        let urls = transport.urls.borrow();
        assert!(urls[0].contains("?city=Norwich"));
        assert!(urls[1].contains("?q=Norwich"));
    }

    #[test]
    fn locationiq_reports_failure_without_calling_out() {
        init_test_logger();
        let tool = GeocoderTool::new(Provider::LocationIq, "http://liq", None);
        let mut address = Address {
            town: Some("Norwich".to_string()),
            ..Address::default()
        };
        assert!(!tool.geocode(&mut address, &NoCallTransport));
    }

    #[test]
    fn reverse_requires_a_centre() {
        let mut address = Address::new();
        assert!(!nominatim_tool().reverse_geocode(&mut address, &NoCallTransport));
    }

    #[test]
    fn reverse_requires_a_configured_url() {
        let tool = GeocoderTool::new(Provider::Nominatim, "http://osm/search", None);
        let mut address = Address::new();
        address.set_centre(51.5, -0.12, None);
        assert!(!tool.reverse_geocode(&mut address, &NoCallTransport));
    }

    #[test]
    fn reverse_fills_in_postal_fields() {
        let transport = ScriptedTransport::new(&[json!({
            "address": {
                "city": "Norwich",
                "county": "Norfolk",
                "country": "United Kingdom",
                "country_code": "gb",
                "postcode": "NR4 7UG"
            }
        })]);
        let mut address = Address::new();
        address.set_centre(52.6216, 1.2187, None);

        assert!(nominatim_tool().reverse_geocode(&mut address, &transport));
        assert_eq!(transport.calls(), 1);
        assert!(transport.urls.borrow()[0]
            .starts_with("http://osm/reverse?format=json&lat=52.6216&lon=1.2187"));
        assert_eq!(address.town.as_deref(), Some("Norwich"));
        assert_eq!(address.country_code.as_deref(), Some("gb"));
    }

    #[test]
    fn config_resolution_is_case_insensitive() {
        let config = GeocoderConfig {
            default_geocoder: "Nominatim".to_string(),
            geocoders: vec![
                GeocoderEntry {
                    name: "google".to_string(),
                    uri: "http://g/json?key=k".to_string(),
                    reverse_uri: None,
                },
                GeocoderEntry {
                    name: "nominatim".to_string(),
                    uri: "http://osm/search".to_string(),
                    reverse_uri: Some("http://osm/reverse".to_string()),
                },
            ],
        };
        let tool = GeocoderTool::from_config(&config).unwrap();
        assert_eq!(tool.provider(), Provider::Nominatim);
        assert_eq!(tool.geocode_url, "http://osm/search");
        assert_eq!(tool.reverse_geocode_url.as_deref(), Some("http://osm/reverse"));
    }

    #[test]
    fn unknown_default_geocoder_is_an_error() {
        let config = GeocoderConfig {
            default_geocoder: "mapzen".to_string(),
            geocoders: vec![],
        };
        match GeocoderTool::from_config(&config) {
            Err(GeocodingError::UnknownGeocoder(name)) => assert_eq!(name, "mapzen"),
            other => panic!("expected an unknown-geocoder error, got {:?}", other),
        }
    }

    #[test]
    fn decimal_pair_parsing() {
        assert_eq!(parse_decimal_pair("32.4567, 12.1234"), Some((32.4567, 12.1234)));
        assert_eq!(parse_decimal_pair("  51.5 , -0.12  "), Some((51.5, -0.12)));
        assert_eq!(parse_decimal_pair("51.5, -0.12;"), Some((51.5, -0.12)));
        assert_eq!(parse_decimal_pair("1.0, 2.0,"), Some((1.0, 2.0)));
        assert_eq!(parse_decimal_pair("51.5"), None);
        assert_eq!(parse_decimal_pair("north, south"), None);
        assert_eq!(parse_decimal_pair("51.5, -0.12 junk"), None);
        assert_eq!(parse_decimal_pair("1.0, 2.0, 3.0"), None);
    }
}
