//! Error types for the crashdesk core: config loading, filter codec, listing fetches,
//! and cron declaration parsing.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ErrorSlot;

/// Errors raised while loading a `.crashdesk.toml` file that was asked for explicitly.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Io { path: path.into().display().to_string(), source }
    }
}

/// Errors from the filter parameter codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown filter key: {0}")]
    UnknownKey(String),
    #[error("invalid base url {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

/// Errors produced by a [`crate::dispatch::Backend`] while fetching a listing page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid backend url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("unexpected status {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("could not decode listing response: {0}")]
    Decode(String),
    /// The backend answered with an `error` object in the response body.
    #[error("{message}")]
    Server { message: String, trace_dump: Option<String> },
}

impl FetchError {
    /// Convert into the message/trace pair shown in the listing error slot.
    pub fn to_slot(&self) -> ErrorSlot {
        match self {
            FetchError::Server { message, trace_dump } => {
                ErrorSlot { message: message.clone(), trace_dump: trace_dump.clone() }
            }
            other => ErrorSlot { message: other.to_string(), trace_dump: None },
        }
    }
}

/// Errors raised while reading or validating cron declarations.
#[derive(Debug, Error)]
pub enum CronError {
    #[error("failed to read cron declarations from {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse cron declarations from {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid cron entry {url}: {reason}")]
    InvalidEntry { url: String, reason: String },
    #[error("unsupported schedule '{0}'")]
    Schedule(String),
}

impl CronError {
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CronError::Io { path: path.into().display().to_string(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_keeps_trace_dump_in_slot() {
        let err = FetchError::Server {
            message: "Quota exceeded".into(),
            trace_dump: Some("Traceback ...".into()),
        };
        let slot = err.to_slot();
        assert_eq!(slot.message, "Quota exceeded");
        assert_eq!(slot.trace_dump.as_deref(), Some("Traceback ..."));
    }

    #[test]
    fn transport_error_slot_has_no_trace() {
        let err = FetchError::Transport {
            url: "http://localhost:9000/testcases/load".into(),
            message: "connection refused".into(),
        };
        let slot = err.to_slot();
        assert!(slot.message.contains("connection refused"));
        assert!(slot.trace_dump.is_none());
    }
}
