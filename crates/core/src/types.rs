//! Core types shared across crashdesk: client configuration, listing responses,
//! the error slot, and pager metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::debounce::DEFAULT_DEBOUNCE_MS;
use crate::error::{ConfigError, FetchError};

// ---------------------------------------------------------------------------
// Client configuration — loaded from .crashdesk.toml or defaults
// ---------------------------------------------------------------------------

/// How listing requests carry the filter parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Parameters in the query string.
    Get,
    /// Parameters as a JSON object body.
    Post,
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            other => Err(ConfigError::InvalidValue {
                key: "method".into(),
                message: format!("expected 'get' or 'post', got '{other}'"),
            }),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// Runtime configuration for talking to the dashboard backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Path of the listing endpoint, joined onto `base_url`.
    pub listing_path: String,
    pub method: Method,
    pub debounce_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".into(),
            listing_path: "/testcases/load".into(),
            method: Method::Post,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Listing responses
// ---------------------------------------------------------------------------

/// Message plus optional server trace shown in place of the result list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSlot {
    pub message: String,
    #[serde(default, rename = "traceDump", skip_serializing_if = "Option::is_none")]
    pub trace_dump: Option<String>,
}

/// Body returned by listing endpoints: `{ items, error?, page?, totalPages?, totalItems? }`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
}

impl ListingResponse {
    /// A response carrying an `error` object is a failure even when items are present.
    pub fn into_result(self) -> Result<ListingResponse, FetchError> {
        match self.error {
            Some(err) => Err(FetchError::Server { message: err.message, trace_dump: err.trace_dump }),
            None => Ok(self),
        }
    }
}

// ---------------------------------------------------------------------------
// Pager
// ---------------------------------------------------------------------------

/// Page position of the current result list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pager {
    /// 1-based current page.
    pub page: u32,
    pub total_pages: Option<u32>,
    pub total_items: Option<u64>,
}

impl Default for Pager {
    fn default() -> Self {
        Self { page: 1, total_pages: None, total_items: None }
    }
}

impl Pager {
    /// Page number to request for "next", if there is one.
    pub fn next_page(&self) -> Option<u32> {
        match self.total_pages {
            Some(total) if self.page >= total => None,
            _ => self.page.checked_add(1),
        }
    }

    pub fn prev_page(&self) -> Option<u32> {
        (self.page > 1).then(|| self.page - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_response_parses_full_shape() {
        let raw = r#"{
            "items": [{"id": 1}, {"id": 2}],
            "page": 2,
            "totalPages": 5,
            "totalItems": 98
        }"#;
        let resp: ListingResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.items.len(), 2);
        assert_eq!(resp.page, Some(2));
        assert_eq!(resp.total_pages, Some(5));
        assert_eq!(resp.total_items, Some(98));
        assert!(resp.into_result().is_ok());
    }

    #[test]
    fn listing_response_with_error_is_failure() {
        let raw = r#"{"items": [], "error": {"message": "boom", "traceDump": "stack"}}"#;
        let resp: ListingResponse = serde_json::from_str(raw).unwrap();
        match resp.into_result() {
            Err(FetchError::Server { message, trace_dump }) => {
                assert_eq!(message, "boom");
                assert_eq!(trace_dump.as_deref(), Some("stack"));
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn next_page_stops_at_largest_page_number() {
        let pager = Pager { page: u32::MAX, total_pages: None, total_items: None };
        assert_eq!(pager.next_page(), None);
        assert_eq!(pager.prev_page(), Some(u32::MAX - 1));
    }

    #[test]
    fn pager_bounds() {
        let pager = Pager { page: 1, total_pages: Some(3), total_items: None };
        assert_eq!(pager.prev_page(), None);
        assert_eq!(pager.next_page(), Some(2));

        let last = Pager { page: 3, total_pages: Some(3), total_items: None };
        assert_eq!(last.next_page(), None);
        assert_eq!(last.prev_page(), Some(2));

        let unknown = Pager { page: 7, total_pages: None, total_items: None };
        assert_eq!(unknown.next_page(), Some(8));
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        assert!("put".parse::<Method>().is_err());
    }
}
