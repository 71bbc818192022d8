//! This crate resolves postal addresses to geographic coordinates (forward
//! geocoding) and geographic coordinates to postal addresses (reverse
//! geocoding) by delegating to one of several interchangeable web geocoding
//! providers: Google-style, Opencage, Nominatim/OpenStreetMap and LocationIQ.
//!
//! The normalized [`Address`](struct.Address.html) model carries the usual
//! postal fields plus up to three owned [`Coordinate`](struct.Coordinate.html)s
//! (centre, north-east bound, south-west bound) and serializes to JSON using
//! the [schema.org PostalAddress](https://schema.org/PostalAddress) vocabulary.
//!
//! A [`GeocoderTool`](struct.GeocoderTool.html) binds one provider together
//! with its endpoint URLs, either directly or resolved from a
//! [`GeocoderConfig`](struct.GeocoderConfig.html). Each geocode call builds a
//! provider-specific query, performs a single blocking GET through an injected
//! [`Transport`](trait.Transport.html) and parses the provider's response
//! shape into the shared model. When a well-formed response yields no match,
//! the call is retried once with the provider's fallback query strategy.
//!
//! ### Example
//!
//! ```no_run
//! use geocoder::{Address, GeocoderTool, HttpTransport, Provider};
//!
//! let tool = GeocoderTool::new(
//!     Provider::Nominatim,
//!     "https://nominatim.openstreetmap.org/search",
//!     Some("https://nominatim.openstreetmap.org/reverse".to_string()),
//! );
//! let transport = HttpTransport::new();
//! let mut address = Address::new();
//! address.town = Some("Norwich".to_string());
//! address.country_code = Some("GB".to_string());
//! if tool.geocode(&mut address, &transport) {
//!     let centre = address.centre().unwrap();
//!     println!("{}, {}", centre.latitude, centre.longitude);
//! }
//! ```

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;

static UA_STRING: &str = "Rust-Geocoder";

pub mod address;
pub mod coordinate;
pub mod country_codes;
pub mod google;
pub mod nominatim;
pub mod opencage;
mod request;
pub mod tool;

pub use crate::address::Address;
pub use crate::coordinate::Coordinate;
pub use crate::tool::{GeocoderConfig, GeocoderEntry, GeocoderTool, Provider};

/// Errors that can occur while building tools or reconstructing the model
/// from JSON.
#[derive(Error, Debug)]
pub enum GeocodingError {
    #[error("no geocoder named \"{0}\" in the configuration")]
    UnknownGeocoder(String),
    #[error("\"{0}\" is not a recognized provider name")]
    UnknownProvider(String),
    #[error("required field \"{0}\" is missing")]
    MissingField(&'static str),
    #[error("field \"{0}\" has the wrong type")]
    InvalidField(&'static str),
}

/// Classification of a single provider invocation.
///
/// Callers need to distinguish "this address has no match" from "try a
/// different provider or credentials", so an empty result is not a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The provider returned at least one usable result.
    Found,
    /// The response was well-formed but contained no match.
    NoMatch,
    /// Transport failure, unparseable response, or a provider-reported
    /// denial (quota, invalid request, server error).
    Failed,
}

/// A transport-level failure, surfaced by a [`Transport`](trait.Transport.html).
#[derive(Error, Debug)]
#[error("{0}")]
pub struct TransportError(pub String);

/// The outbound HTTP capability.
///
/// The dispatch layer performs at most two sequential GETs per geocode call
/// and imposes no retries, timeouts or locking of its own; implementations
/// that are `Sync` may be shared across threads freely.
pub trait Transport {
    /// Perform a GET for `url` and return the raw response body.
    fn get(&self, url: &str) -> Result<String, TransportError>;
}

/// A blocking [`Transport`](trait.Transport.html) backed by reqwest.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the crate's default `User-Agent` header.
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(UA_STRING));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .expect("Couldn't build a client!");
        HttpTransport { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        HttpTransport::new()
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<String, TransportError> {
        self.client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .map_err(|e| TransportError(e.to_string()))
    }
}

/// Route the crate's log output to the test harness; run the tests with
/// `RUST_LOG=geocoder=debug` to see it. Safe to call from every test.
#[cfg(test)]
pub(crate) fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
