//! Shared plumbing for provider calls: one place that performs the GET,
//! parses the body as JSON and hands the tree to a provider's parser.

use log::{debug, warn};
use serde_json::Value;

use crate::address::Address;
use crate::{Outcome, Transport};

/// Result of appending one optional, URL-escaped field to a query string.
///
/// The caller needs to know whether anything was written so it can decide
/// whether the next field gets the initial prefix or a separator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FieldAppend {
    Appended,
    Absent,
}

/// Append `prefix` followed by the URL-escaped `value` to `query`, if the
/// value is present. An absent value is not an error.
pub(crate) fn append_escaped_field(
    query: &mut String,
    value: Option<&str>,
    prefix: &str,
) -> FieldAppend {
    match value {
        Some(value) => {
            query.push_str(prefix);
            query.push_str(&urlencoding::encode(value));
            FieldAppend::Appended
        }
        None => FieldAppend::Absent,
    }
}

/// Perform the GET for an assembled provider URL, parse the body as JSON and
/// delegate outcome classification to the provider's parser.
///
/// Transport failure and an unparseable body both classify as
/// [`Outcome::Failed`](../enum.Outcome.html); everything past that point is
/// the parser's decision.
pub(crate) fn invoke<F>(
    transport: &dyn Transport,
    url: &str,
    address: &mut Address,
    parse: F,
) -> Outcome
where
    F: FnOnce(&mut Address, &Value) -> Outcome,
{
    let body = match transport.get(url) {
        Ok(body) => body,
        Err(err) => {
            warn!("geocoder request to {} failed: {}", url, err);
            return Outcome::Failed;
        }
    };

    debug!("geocoder response for {}: {}", url, body);

    match serde_json::from_str::<Value>(&body) {
        Ok(tree) => parse(address, &tree),
        Err(err) => {
            warn!("unparseable geocoder response from {}: {}", url, err);
            Outcome::Failed
        }
    }
}
