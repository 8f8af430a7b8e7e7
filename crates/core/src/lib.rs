//! crashdesk — client core for a fuzzing testcase dashboard.
//!
//! # Modules
//!
//! - [`params`] — Filter keys and the always-populated parameter map
//! - [`query`] — Deterministic query-string codec and endpoint URL building
//! - [`matcher`] — Search-within-dropdown option matching
//! - [`debounce`] — Keystroke coalescing with a ticket counter
//! - [`store`] — Reducer, view state, and subscriptions
//! - [`dispatch`] — Backend trait and dispatch-and-cancel request tracking
//! - [`controller`] — One listing component wiring all of the above
//! - [`cron`] — `cron.yaml` declarations for backend endpoints
//! - [`types`] — Client config, listing responses, pager
//! - [`error`] — Error types

pub mod controller;
pub mod cron;
pub mod debounce;
pub mod dispatch;
pub mod error;
pub mod matcher;
pub mod params;
pub mod query;
pub mod store;
pub mod types;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use error::ConfigError;
use types::{ClientConfig, Method};

/// Name of the per-directory config file.
pub const CONFIG_FILE: &str = ".crashdesk.toml";

// ---------------------------------------------------------------------------
// Cross-platform path helpers
// ---------------------------------------------------------------------------

/// Per-user fallback location: `%APPDATA%/crashdesk` on Windows, `~/.crashdesk` elsewhere.
fn user_config_dir() -> Option<PathBuf> {
    if cfg!(target_os = "windows") {
        return std::env::var_os("APPDATA").map(|a| PathBuf::from(a).join("crashdesk"));
    }
    std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".crashdesk"))
}

// ---------------------------------------------------------------------------
// .crashdesk.toml config loading
// ---------------------------------------------------------------------------

/// Known keys in `.crashdesk.toml` for config validation.
const KNOWN_CONFIG_KEYS: &[&str] =
    &["base_url", "listing_path", "method", "debounce_ms", "timeout_secs"];

/// Simple Levenshtein edit distance for typo suggestions.
fn edit_distance(a: &str, b: &str) -> usize {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Load `.crashdesk.toml` from `dir`, then the user config dir.
///
/// A missing file yields defaults. A file that can't be read or parsed yields defaults
/// with a warning, as does any key with a bad value.
pub fn load_crashdesk_config(dir: &Path) -> ClientConfig {
    let candidates = [Some(dir.join(CONFIG_FILE)), user_config_dir().map(|d| d.join("config.toml"))];
    for path in candidates.into_iter().flatten() {
        if !path.exists() {
            continue;
        }
        debug!(path = %path.display(), "Loading config");
        match load_config_file(&path) {
            Ok(config) => return config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring config file");
                return ClientConfig::default();
            }
        }
    }
    ClientConfig::default()
}

/// Load a config file that was named explicitly. Unlike [`load_crashdesk_config`],
/// read and parse failures are errors.
pub fn load_config_file(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::from_io(path, e))?;
    parse_config(&content).map_err(|e| match e {
        ConfigError::Parse { message, .. } => {
            ConfigError::Parse { path: path.display().to_string(), message }
        }
        other => other,
    })
}

/// Parse config text, merging overrides onto [`ClientConfig::default`].
pub fn parse_config(content: &str) -> Result<ClientConfig, ConfigError> {
    let table = content
        .parse::<toml::Table>()
        .map_err(|e| ConfigError::Parse { path: String::new(), message: e.to_string() })?;
    let mut config = ClientConfig::default();

    // Validate keys — warn on unknown
    for key in table.keys() {
        if KNOWN_CONFIG_KEYS.contains(&key.as_str()) {
            continue;
        }
        let suggestion = KNOWN_CONFIG_KEYS.iter().min_by_key(|k| edit_distance(key, k));
        match suggestion {
            Some(s) if edit_distance(key, s) <= 3 => warn!(
                key = key.as_str(),
                suggestion = *s,
                "Unknown key in {CONFIG_FILE} — did you mean '{s}'?"
            ),
            _ => warn!(
                key = key.as_str(),
                "Unknown key in {CONFIG_FILE} (known keys: {})",
                KNOWN_CONFIG_KEYS.join(", ")
            ),
        }
    }

    if let Some(v) = table.get("base_url") {
        config.base_url = expect_str(v, "base_url")?.to_string();
    }
    if let Some(v) = table.get("listing_path") {
        config.listing_path = expect_str(v, "listing_path")?.to_string();
    }
    if let Some(v) = table.get("method") {
        config.method = expect_str(v, "method")?.parse::<Method>()?;
    }
    if let Some(v) = table.get("debounce_ms") {
        config.debounce_ms = expect_positive(v, "debounce_ms")?;
    }
    if let Some(v) = table.get("timeout_secs") {
        config.timeout_secs = expect_positive(v, "timeout_secs")?;
    }

    Ok(config)
}

fn expect_str<'a>(value: &'a toml::Value, key: &str) -> Result<&'a str, ConfigError> {
    value.as_str().ok_or_else(|| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected a string, got {}", value.type_str()),
    })
}

fn expect_positive(value: &toml::Value, key: &str) -> Result<u64, ConfigError> {
    match value.as_integer() {
        Some(n) if n > 0 => Ok(n as u64),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a positive integer, got {value}"),
        }),
    }
}
