//! URL codec for [`FilterParams`]: deterministic query-string encoding, tolerant decoding,
//! endpoint URL building, and the JSON body used for POST listings.
//!
//! Only the application boundary (CLI flags, HTTP transport, shared links) goes through here;
//! everything inside the crate works with [`FilterParams`] directly.

use serde_json::{Map, Value};
use tracing::debug;
use url::form_urlencoded;
use url::Url;

use crate::error::CodecError;
use crate::params::{FilterKey, FilterParams};

/// Encode the non-empty filters as `application/x-www-form-urlencoded`, keys in
/// [`FilterKey::ALL`] order so equal params always produce identical strings.
pub fn encode(params: &FilterParams) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params.non_empty() {
        serializer.append_pair(key.wire_name(), value);
    }
    serializer.finish()
}

/// Decode a query string (with or without a leading `?`). Unknown keys are skipped,
/// the last occurrence of a repeated key wins, and all keys end up present.
pub fn decode(query: &str) -> FilterParams {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut params = FilterParams::new();
    for (name, value) in form_urlencoded::parse(query.as_bytes()) {
        match name.parse::<FilterKey>() {
            Ok(key) => {
                params.set(key, value.into_owned());
            }
            Err(_) => debug!(key = %name, "Skipping unknown query parameter"),
        }
    }
    params
}

/// Join `path` onto `base` and attach the encoded filters as the query string.
pub fn to_url(base: &str, path: &str, params: &FilterParams) -> Result<Url, CodecError> {
    let mut url = endpoint_url(base, path)?;
    let query = encode(params);
    url.set_query(if query.is_empty() { None } else { Some(&query) });
    Ok(url)
}

/// Resolve the endpoint URL without any query string.
pub fn endpoint_url(base: &str, path: &str) -> Result<Url, CodecError> {
    let invalid = |message: String| CodecError::InvalidUrl { url: base.to_string(), message };
    let mut base_url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    if base_url.cannot_be_a_base() {
        return Err(invalid("not a hierarchical URL".into()));
    }
    if !base_url.path().ends_with('/') {
        let mut p = base_url.path().to_string();
        p.push('/');
        base_url.set_path(&p);
    }
    base_url.join(path.trim_start_matches('/')).map_err(|e| invalid(e.to_string()))
}

/// JSON object body for POST listings. Every key is sent under its wire name,
/// empty values included, so the backend always sees the full parameter set.
pub fn to_json_body(params: &FilterParams) -> Value {
    let body: Map<String, Value> = params
        .iter()
        .map(|(key, value)| (key.wire_name().to_string(), Value::String(value.to_string())))
        .collect();
    Value::Object(body)
}
