/* src/query.rs */

use std::collections::HashMap;
use url::form_urlencoded;

/// Splits a raw request URL at the first `?` and decodes the query string.
///
/// Duplicate keys keep the last value. A URL without `?` yields the whole
/// input as the path and an empty map.
pub fn decode(raw_url: &str) -> (&str, HashMap<String, String>) {
    match raw_url.split_once('?') {
        Some((path, query)) => (
            path,
            form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        ),
        None => (raw_url, HashMap::new()),
    }
}

/// Gets the path part of a raw URL, without the query string.
pub fn path_of(raw_url: &str) -> &str {
    raw_url.split('?').next().unwrap_or(raw_url)
}
