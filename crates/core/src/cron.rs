//! Cron declarations for the dashboard's backend endpoints (`cron.yaml`).
//!
//! The schedules here are only declared: an external job runner reads them and calls
//! each URL on the target service. This module loads the file, parses each schedule
//! into a typed [`Schedule`], and rejects entries the runner would choke on.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CronError;

/// One entry as written in `cron.yaml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronEntry {
    pub url: String,
    pub description: String,
    pub schedule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CronDocument {
    #[serde(default)]
    cron: Vec<CronEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Minutes,
    Hours,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    const ALL: [(Weekday, &'static str, &'static str); 7] = [
        (Weekday::Monday, "monday", "mon"),
        (Weekday::Tuesday, "tuesday", "tue"),
        (Weekday::Wednesday, "wednesday", "wed"),
        (Weekday::Thursday, "thursday", "thu"),
        (Weekday::Friday, "friday", "fri"),
        (Weekday::Saturday, "saturday", "sat"),
        (Weekday::Sunday, "sunday", "sun"),
    ];

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().find(|(_, long, short)| s == *long || s == *short).map(|(d, _, _)| *d)
    }

    fn name(self) -> &'static str {
        Self::ALL.iter().find(|(d, _, _)| *d == self).map(|(_, long, _)| *long).unwrap_or("")
    }
}

/// Time of day, 24-hour clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl FromStr for TimeOfDay {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s.split_once(':').ok_or(())?;
        let hour: u8 = h.parse().map_err(|_| ())?;
        let minute: u8 = m.parse().map_err(|_| ())?;
        if hour > 23 || minute > 59 || m.len() != 2 {
            return Err(());
        }
        Ok(Self { hour, minute })
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// The schedule grammar subset the dashboard's declarations use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schedule {
    /// `every N minutes|hours [synchronized]`
    Every { interval: u32, unit: IntervalUnit, synchronized: bool },
    /// `every day HH:MM`
    Daily { at: TimeOfDay },
    /// `every monday HH:MM`
    Weekly { day: Weekday, at: TimeOfDay },
}

impl Schedule {
    /// Interval length in minutes for `Every` schedules.
    pub fn interval_minutes(&self) -> Option<u32> {
        match self {
            Schedule::Every { interval, unit: IntervalUnit::Minutes, .. } => Some(*interval),
            Schedule::Every { interval, unit: IntervalUnit::Hours, .. } => {
                interval.checked_mul(60)
            }
            _ => None,
        }
    }
}

impl FromStr for Schedule {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || CronError::Schedule(s.to_string());
        let lower = s.trim().to_ascii_lowercase();
        let tokens: Vec<&str> = lower.split_whitespace().collect();

        match tokens.as_slice() {
            ["every", n, unit, rest @ ..] if n.parse::<u32>().is_ok() => {
                let interval: u32 = n.parse().map_err(|_| unsupported())?;
                if interval == 0 {
                    return Err(unsupported());
                }
                let unit = match *unit {
                    "minute" | "minutes" | "min" | "mins" => IntervalUnit::Minutes,
                    "hour" | "hours" => IntervalUnit::Hours,
                    _ => return Err(unsupported()),
                };
                let synchronized = match rest {
                    [] => false,
                    ["synchronized"] => true,
                    _ => return Err(unsupported()),
                };
                Ok(Schedule::Every { interval, unit, synchronized })
            }
            ["every", "day", at] => {
                let at = at.parse().map_err(|_| unsupported())?;
                Ok(Schedule::Daily { at })
            }
            ["every", day, at] => {
                let day = Weekday::parse(day).ok_or_else(unsupported)?;
                let at = at.parse().map_err(|_| unsupported())?;
                Ok(Schedule::Weekly { day, at })
            }
            _ => Err(unsupported()),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Every { interval, unit, synchronized } => {
                let unit = match unit {
                    IntervalUnit::Minutes => "minutes",
                    IntervalUnit::Hours => "hours",
                };
                write!(f, "every {interval} {unit}")?;
                if *synchronized {
                    f.write_str(" synchronized")?;
                }
                Ok(())
            }
            Schedule::Daily { at } => write!(f, "every day {at}"),
            Schedule::Weekly { day, at } => write!(f, "every {} {at}", day.name()),
        }
    }
}

/// A validated entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CronJob {
    pub url: String,
    pub description: String,
    pub schedule: Schedule,
    pub target: Option<String>,
}

impl CronJob {
    /// Service the runner should call; unset means the default service.
    pub fn target_or_default(&self) -> &str {
        self.target.as_deref().unwrap_or("default")
    }
}

/// Read and validate a `cron.yaml` file.
pub fn load_cron(path: impl AsRef<Path>) -> Result<Vec<CronJob>, CronError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|err| CronError::from_io(path, err))?;
    let entries = parse_cron(&raw, path)?;
    validate(&entries)
}

/// Parse the raw YAML without validating schedules.
pub fn parse_cron(raw: &str, path: &Path) -> Result<Vec<CronEntry>, CronError> {
    let doc: CronDocument = serde_yaml::from_str(raw).map_err(|err| CronError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    debug!(path = %path.display(), entries = doc.cron.len(), "Parsed cron declarations");
    Ok(doc.cron)
}

/// Check every entry and parse its schedule. Fails on the first bad entry.
pub fn validate(entries: &[CronEntry]) -> Result<Vec<CronJob>, CronError> {
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut jobs = Vec::with_capacity(entries.len());

    for entry in entries {
        let invalid =
            |reason: &str| CronError::InvalidEntry { url: entry.url.clone(), reason: reason.into() };

        if !entry.url.starts_with('/') {
            return Err(invalid("url must be an absolute path"));
        }
        if entry.description.trim().is_empty() {
            return Err(invalid("description is empty"));
        }
        let target = entry.target.as_deref().unwrap_or("default");
        if !seen.insert((entry.url.as_str(), target)) {
            return Err(invalid("declared more than once for the same target"));
        }
        let schedule: Schedule = entry.schedule.parse()?;

        jobs.push(CronJob {
            url: entry.url.clone(),
            description: entry.description.clone(),
            schedule,
            target: entry.target.clone(),
        });
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
cron:
- url: /schedule-progression-tasks
  description: Schedule progression tasks
  schedule: every 1 hours
  target: cron-service
- url: /triage
  description: Triage open reproducible crashes
  schedule: every 1 hours synchronized
  target: cron-service
- url: /project-setup
  description: Sync project configuration
  schedule: every day 03:30
- url: /cleanup
  description: Weekly cleanup
  schedule: every sunday 00:00
"#;

    #[test]
    fn parses_interval_schedules() {
        assert_eq!(
            "every 30 minutes".parse::<Schedule>().unwrap(),
            Schedule::Every { interval: 30, unit: IntervalUnit::Minutes, synchronized: false }
        );
        assert_eq!(
            "every 6 hours synchronized".parse::<Schedule>().unwrap(),
            Schedule::Every { interval: 6, unit: IntervalUnit::Hours, synchronized: true }
        );
        assert_eq!("every 2 hours".parse::<Schedule>().unwrap().interval_minutes(), Some(120));
    }

    #[test]
    fn parses_daily_and_weekly() {
        assert_eq!(
            "every day 03:30".parse::<Schedule>().unwrap(),
            Schedule::Daily { at: TimeOfDay { hour: 3, minute: 30 } }
        );
        assert_eq!(
            "every Mon 09:05".parse::<Schedule>().unwrap(),
            Schedule::Weekly { day: Weekday::Monday, at: TimeOfDay { hour: 9, minute: 5 } }
        );
    }

    #[test]
    fn rejects_unsupported_schedules() {
        for bad in ["", "every", "every 0 minutes", "every 5 days", "every day 25:00", "hourly"] {
            assert!(bad.parse::<Schedule>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn display_round_trips_canonical_form() {
        for s in ["every 15 minutes", "every 1 hours synchronized", "every day 00:00", "every friday 17:45"] {
            assert_eq!(s.parse::<Schedule>().unwrap().to_string(), s);
        }
    }

    #[test]
    fn loads_sample_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let jobs = load_cron(file.path()).unwrap();
        assert_eq!(jobs.len(), 4);
        assert_eq!(jobs[0].target_or_default(), "cron-service");
        assert_eq!(jobs[2].target_or_default(), "default");
        assert_eq!(jobs[3].schedule.to_string(), "every sunday 00:00");
    }

    #[test]
    fn rejects_relative_url_and_duplicates() {
        let entry = |url: &str| CronEntry {
            url: url.into(),
            description: "x".into(),
            schedule: "every 1 hours".into(),
            target: None,
        };
        let err = validate(&[entry("triage")]).unwrap_err();
        assert!(matches!(err, CronError::InvalidEntry { .. }));

        let err = validate(&[entry("/triage"), entry("/triage")]).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_cron("/nonexistent/cron.yaml").unwrap_err();
        assert!(matches!(err, CronError::Io { .. }));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = parse_cron("cron: [url: {", Path::new("cron.yaml")).unwrap_err();
        assert!(matches!(err, CronError::Parse { .. }));
    }
}
