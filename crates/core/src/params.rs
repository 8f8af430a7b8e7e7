//! Filter parameter model for the testcase listing: the closed set of filter keys,
//! the always-populated parameter map, and the normalization rules applied on every write
//! (numeric fields, hourly `days` clamp, page reset on filter change).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CodecError;

/// Largest `days` window the listing accepts when results are grouped by hour.
pub const MAX_HOURLY_DAYS: u32 = 3;

/// Group value that triggers the hourly `days` clamp.
const GROUP_BY_HOUR: &str = "hour";

// ---------------------------------------------------------------------------
// Filter keys
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKey {
    Keyword,
    Project,
    Fuzzer,
    Job,
    Platform,
    Reproducible,
    Security,
    Issue,
    Status,
    Group,
    Sort,
    Block,
    Days,
    Page,
}

impl FilterKey {
    /// Every key, in the order used for query-string serialization.
    pub const ALL: [FilterKey; 14] = [
        FilterKey::Keyword,
        FilterKey::Project,
        FilterKey::Fuzzer,
        FilterKey::Job,
        FilterKey::Platform,
        FilterKey::Reproducible,
        FilterKey::Security,
        FilterKey::Issue,
        FilterKey::Status,
        FilterKey::Group,
        FilterKey::Sort,
        FilterKey::Block,
        FilterKey::Days,
        FilterKey::Page,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterKey::Keyword => "keyword",
            FilterKey::Project => "project",
            FilterKey::Fuzzer => "fuzzer",
            FilterKey::Job => "job",
            FilterKey::Platform => "platform",
            FilterKey::Reproducible => "reproducible",
            FilterKey::Security => "security",
            FilterKey::Issue => "issue",
            FilterKey::Status => "status",
            FilterKey::Group => "group",
            FilterKey::Sort => "sort",
            FilterKey::Block => "block",
            FilterKey::Days => "days",
            FilterKey::Page => "page",
        }
    }

    /// Name used on the wire (query string and JSON body). The keyword box travels as `q`.
    pub fn wire_name(self) -> &'static str {
        match self {
            FilterKey::Keyword => "q",
            other => other.name(),
        }
    }

    /// Whether the value must be a positive integer (or empty).
    pub fn is_numeric(self) -> bool {
        matches!(self, FilterKey::Days | FilterKey::Page)
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterKey {
    type Err = CodecError;

    /// Accepts either the display name or the wire name (`q` for keyword).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterKey::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s || k.wire_name() == s)
            .ok_or_else(|| CodecError::UnknownKey(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Parameter map
// ---------------------------------------------------------------------------

/// The full set of user-chosen search/filter criteria. Every key is always present;
/// an unset filter holds the empty string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<FilterKey, String>", into = "BTreeMap<FilterKey, String>")]
pub struct FilterParams {
    values: BTreeMap<FilterKey, String>,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self { values: FilterKey::ALL.iter().map(|k| (*k, String::new())).collect() }
    }
}

impl From<BTreeMap<FilterKey, String>> for FilterParams {
    fn from(map: BTreeMap<FilterKey, String>) -> Self {
        let mut params = FilterParams::default();
        for (key, value) in map {
            params.set(key, value);
        }
        params
    }
}

impl From<FilterParams> for BTreeMap<FilterKey, String> {
    fn from(params: FilterParams) -> Self {
        params.values
    }
}

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter, convenient in tests and CLI flag handling.
    pub fn with(mut self, key: FilterKey, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: FilterKey) -> &str {
        self.values.get(&key).map(String::as_str).unwrap_or("")
    }

    /// Write a single value after normalization. Does not touch `page`.
    /// Returns true if the stored value changed.
    pub fn set(&mut self, key: FilterKey, value: impl Into<String>) -> bool {
        let value = normalize_value(key, value.into());
        let before = self.snapshot_days();
        let slot = self.values.entry(key).or_default();
        let changed = *slot != value;
        if changed {
            *slot = value;
        }
        if matches!(key, FilterKey::Days | FilterKey::Group) {
            self.clamp_hourly_days();
        }
        changed || before != self.snapshot_days()
    }

    /// Apply a user edit to one filter. Editing anything other than `page` sends the
    /// listing back to the first page. Returns the keys whose values changed.
    pub fn update(&mut self, key: FilterKey, value: impl Into<String>) -> Vec<FilterKey> {
        let before = self.clone();
        self.set(key, value);
        if key != FilterKey::Page && before.get(key) != self.get(key) {
            self.set(FilterKey::Page, "");
        }
        before.diff(self)
    }

    /// Keys whose values differ between `self` and `other`, in serialization order.
    pub fn diff(&self, other: &FilterParams) -> Vec<FilterKey> {
        FilterKey::ALL.iter().copied().filter(|k| self.get(*k) != other.get(*k)).collect()
    }

    /// Iterate over all `(key, value)` pairs in serialization order.
    pub fn iter(&self) -> impl Iterator<Item = (FilterKey, &str)> {
        FilterKey::ALL.iter().map(move |k| (*k, self.get(*k)))
    }

    /// Iterate over the filters that are actually set.
    pub fn non_empty(&self) -> impl Iterator<Item = (FilterKey, &str)> {
        self.iter().filter(|(_, v)| !v.is_empty())
    }

    /// Current page as a 1-based number (`""` means the first page).
    pub fn page_number(&self) -> u32 {
        self.get(FilterKey::Page).parse().unwrap_or(1)
    }

    fn snapshot_days(&self) -> String {
        self.get(FilterKey::Days).to_string()
    }

    fn clamp_hourly_days(&mut self) {
        if self.get(FilterKey::Group) != GROUP_BY_HOUR {
            return;
        }
        let days: Option<u32> = self.get(FilterKey::Days).parse().ok();
        if let Some(days) = days {
            if days > MAX_HOURLY_DAYS {
                debug!(days, max = MAX_HOURLY_DAYS, "Clamping days for hourly grouping");
                self.values.insert(FilterKey::Days, MAX_HOURLY_DAYS.to_string());
            }
        }
    }
}

/// Numeric fields accept only positive integers; anything else is dropped to empty.
fn normalize_value(key: FilterKey, value: String) -> String {
    if !key.is_numeric() {
        return value;
    }
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    match trimmed.parse::<u32>() {
        Ok(n) if n > 0 => n.to_string(),
        _ => {
            debug!(key = key.name(), value = trimmed, "Ignoring malformed numeric filter");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_present_after_construction() {
        let params = FilterParams::new();
        assert_eq!(params.iter().count(), 14);
        assert!(params.iter().all(|(_, v)| v.is_empty()));
    }

    #[test]
    fn key_parses_from_name_and_wire_name() {
        assert_eq!("keyword".parse::<FilterKey>(), Ok(FilterKey::Keyword));
        assert_eq!("q".parse::<FilterKey>(), Ok(FilterKey::Keyword));
        assert_eq!("fuzzer".parse::<FilterKey>(), Ok(FilterKey::Fuzzer));
        assert_eq!(
            "bogus".parse::<FilterKey>(),
            Err(CodecError::UnknownKey("bogus".into()))
        );
    }

    #[test]
    fn changing_filter_resets_page() {
        let mut params = FilterParams::new().with(FilterKey::Page, "4");
        let changed = params.update(FilterKey::Fuzzer, "afl");
        assert_eq!(params.get(FilterKey::Page), "");
        assert_eq!(changed, vec![FilterKey::Fuzzer, FilterKey::Page]);
    }

    #[test]
    fn changing_page_leaves_filters_untouched() {
        let mut params =
            FilterParams::new().with(FilterKey::Fuzzer, "afl").with(FilterKey::Job, "linux_asan");
        let changed = params.update(FilterKey::Page, "2");
        assert_eq!(changed, vec![FilterKey::Page]);
        assert_eq!(params.get(FilterKey::Fuzzer), "afl");
        assert_eq!(params.get(FilterKey::Job), "linux_asan");
    }

    #[test]
    fn setting_same_value_does_not_reset_page() {
        let mut params = FilterParams::new().with(FilterKey::Fuzzer, "afl").with(FilterKey::Page, "3");
        let changed = params.update(FilterKey::Fuzzer, "afl");
        assert!(changed.is_empty());
        assert_eq!(params.get(FilterKey::Page), "3");
    }

    #[test]
    fn malformed_days_is_ignored() {
        let params = FilterParams::new().with(FilterKey::Days, "seven");
        assert_eq!(params.get(FilterKey::Days), "");
        let params = FilterParams::new().with(FilterKey::Days, "-2");
        assert_eq!(params.get(FilterKey::Days), "");
        let params = FilterParams::new().with(FilterKey::Days, " 14 ");
        assert_eq!(params.get(FilterKey::Days), "14");
    }

    #[test]
    fn days_clamped_when_grouping_by_hour() {
        let params = FilterParams::new().with(FilterKey::Days, "30").with(FilterKey::Group, "hour");
        assert_eq!(params.get(FilterKey::Days), "3");

        let params = FilterParams::new().with(FilterKey::Group, "hour").with(FilterKey::Days, "7");
        assert_eq!(params.get(FilterKey::Days), "3");

        let params = FilterParams::new().with(FilterKey::Group, "day").with(FilterKey::Days, "7");
        assert_eq!(params.get(FilterKey::Days), "7");
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a = FilterParams::new().with(FilterKey::Job, "j").with(FilterKey::Fuzzer, "f");
        let b = FilterParams::new().with(FilterKey::Fuzzer, "f").with(FilterKey::Job, "j");
        assert_eq!(a, b);
    }

    #[test]
    fn deserialized_params_fill_missing_keys() {
        let params: FilterParams = serde_json::from_str(r#"{"fuzzer":"afl","page":"x"}"#).unwrap();
        assert_eq!(params.get(FilterKey::Fuzzer), "afl");
        assert_eq!(params.get(FilterKey::Page), "");
        assert_eq!(params.iter().count(), 14);
    }

    #[test]
    fn page_number_defaults_to_first() {
        assert_eq!(FilterParams::new().page_number(), 1);
        assert_eq!(FilterParams::new().with(FilterKey::Page, "5").page_number(), 5);
    }
}
