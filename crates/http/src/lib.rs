//! HTTP transport for crashdesk: a [`Backend`] that fetches listing pages from the
//! dashboard's JSON endpoints with `reqwest`.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use crashdesk_core::dispatch::Backend;
use crashdesk_core::error::FetchError;
use crashdesk_core::params::FilterParams;
use crashdesk_core::query;
use crashdesk_core::types::{ClientConfig, ListingResponse, Method};

/// Listing client bound to one endpoint.
#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    endpoint: Url,
    method: Method,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        let endpoint = query::endpoint_url(&config.base_url, &config.listing_path).map_err(|e| {
            FetchError::InvalidUrl { url: config.base_url.clone(), message: e.to_string() }
        })?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| FetchError::Transport { url: endpoint.to_string(), message: e.to_string() })?;
        Ok(Self { http, endpoint, method: config.method })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The URL a GET for `params` would hit. Useful for logging and shareable links.
    pub fn url_for(&self, params: &FilterParams) -> Url {
        let mut url = self.endpoint.clone();
        let q = query::encode(params);
        url.set_query(if q.is_empty() { None } else { Some(&q) });
        url
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch(&self, params: &FilterParams) -> Result<ListingResponse, FetchError> {
        let request = match self.method {
            Method::Get => self.http.get(self.url_for(params)),
            Method::Post => self.http.post(self.endpoint.clone()).json(&query::to_json_body(params)),
        };
        let url = self.endpoint.to_string();
        debug!(method = %self.method, url = url.as_str(), "Fetching listing");

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Transport { url: url.clone(), message: e.to_string() })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport { url: url.clone(), message: e.to_string() })?;

        decode_listing(status, &body, &url)
    }
}

/// Turn a status + body into a listing. Error bodies that carry an `error` object keep
/// their message and trace; anything else non-2xx is reported by status.
fn decode_listing(status: StatusCode, body: &str, url: &str) -> Result<ListingResponse, FetchError> {
    let parsed = serde_json::from_str::<ListingResponse>(body);
    if !status.is_success() {
        return match parsed {
            Ok(listing) if listing.error.is_some() => listing.into_result(),
            _ => Err(FetchError::Status { url: url.to_string(), status: status.as_u16() }),
        };
    }
    parsed.map_err(|e| FetchError::Decode(e.to_string()))?.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crashdesk_core::params::FilterKey;

    #[test]
    fn decode_success_body() {
        let listing = decode_listing(StatusCode::OK, r#"{"items":[1,2,3]}"#, "u").unwrap();
        assert_eq!(listing.items.len(), 3);
    }

    #[test]
    fn decode_error_status_with_error_body() {
        let err = decode_listing(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":{"message":"Datastore timeout","traceDump":"File x.py"}}"#,
            "u",
        )
        .unwrap_err();
        match err {
            FetchError::Server { message, trace_dump } => {
                assert_eq!(message, "Datastore timeout");
                assert_eq!(trace_dump.as_deref(), Some("File x.py"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_error_status_with_html_body() {
        let err = decode_listing(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>", "u").unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 502, .. }));
    }

    #[test]
    fn decode_garbage_success_body() {
        let err = decode_listing(StatusCode::OK, "not json", "u").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn url_for_appends_encoded_params() {
        let config = ClientConfig { method: Method::Get, ..ClientConfig::default() };
        let backend = HttpBackend::new(&config).unwrap();
        let params = FilterParams::new().with(FilterKey::Keyword, "use after free");
        assert_eq!(
            backend.url_for(&params).as_str(),
            "http://localhost:9000/testcases/load?q=use+after+free"
        );
        assert_eq!(backend.url_for(&FilterParams::new()).as_str(), "http://localhost:9000/testcases/load");
    }

    #[test]
    fn rejects_bad_base_url() {
        let config = ClientConfig { base_url: "::nope::".into(), ..ClientConfig::default() };
        assert!(matches!(HttpBackend::new(&config), Err(FetchError::InvalidUrl { .. })));
    }
}
