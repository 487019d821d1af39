//! Publish-date normalization.
//!
//! Topic pages print dates as `YYYY.MM.DD`, usually wrapped in brackets
//! (`[2024.10.15]`). Older page layouts printed the year in the Juche era
//! instead (`[Juche 113.10.15]`), which is the Gregorian year minus 1911.
//!
//! # Calendar policy
//!
//! [`DatePolicy::legacy_dual_calendar`] controls era-marked input:
//!
//! | Input                 | `true` (default) | `false`  |
//! |-----------------------|------------------|----------|
//! | `[2024.10.15]`        | 2024-10-15       | 2024-10-15 |
//! | `[Juche 113.10.15]`   | 2024-10-15       | missing  |
//!
//! Unmarked years are always taken as Gregorian.
//!
//! Any failure (wrong shape, non-numeric part, year outside
//! `[1900, current year]`, impossible month/day) yields `None`. Failures
//! are logged, never propagated.

use chrono::{Datelike, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Sentinel the source pages (and older archives) use for "no date".
pub const UNKNOWN: &str = "Unknown";

/// Offset between Juche era years and Gregorian years.
pub const JUCHE_OFFSET: i32 = 1911;

/// Earliest accepted Gregorian year.
pub const MIN_YEAR: i32 = 1900;

static ERA_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^juche\s*").unwrap());

/// Versioned calendar policy for [`DateNormalizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatePolicy {
    /// Accept era-marked years and convert them with [`JUCHE_OFFSET`].
    pub legacy_dual_calendar: bool,
}

impl Default for DatePolicy {
    fn default() -> Self {
        Self {
            legacy_dual_calendar: true,
        }
    }
}

/// Converts raw topic-page date strings into calendar dates.
#[derive(Debug, Clone)]
pub struct DateNormalizer {
    policy: DatePolicy,
    current_year: i32,
}

impl DateNormalizer {
    /// Build a normalizer whose upper year bound is the local current year.
    pub fn new(policy: DatePolicy) -> Self {
        Self::with_current_year(policy, Local::now().year())
    }

    pub fn with_current_year(policy: DatePolicy, current_year: i32) -> Self {
        Self {
            policy,
            current_year,
        }
    }

    pub fn policy(&self) -> DatePolicy {
        self.policy
    }

    /// Normalize a raw date string.
    ///
    /// Returns `None` for absent input, the [`UNKNOWN`] sentinel, or any
    /// string that does not describe a valid date in the accepted range.
    pub fn normalize(&self, raw: Option<&str>) -> Option<NaiveDate> {
        let raw = raw?;
        let cleaned = raw.replace(['[', ']'], "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() || cleaned == UNKNOWN {
            return None;
        }

        let (body, era) = match ERA_MARKER.find(cleaned) {
            Some(m) => (&cleaned[m.end()..], true),
            None => (cleaned, false),
        };
        if era && !self.policy.legacy_dual_calendar {
            warn!(raw, "Era-marked date rejected by current calendar policy");
            return None;
        }

        let parts: Vec<&str> = body.split('.').map(str::trim).collect();
        let [year, month, day] = parts.as_slice() else {
            warn!(raw, components = parts.len(), "Date does not have three components");
            return None;
        };
        let mut values = [0u32; 3];
        for (value, part) in values.iter_mut().zip([year, month, day]) {
            match parse_component(part) {
                Ok(v) => *value = v,
                Err(ComponentError::NonNumeric) => {
                    warn!(raw, component = *part, "Date has a non-numeric component");
                    return None;
                }
                Err(ComponentError::TooLarge) => {
                    warn!(raw, component = *part, "Date component is out of range");
                    return None;
                }
            }
        }
        let [year, month, day] = values;

        let year = match i32::try_from(year)
            .ok()
            .and_then(|y| if era { y.checked_add(JUCHE_OFFSET) } else { Some(y) })
        {
            Some(y) => y,
            None => {
                warn!(raw, year, era, "Date year out of range");
                return None;
            }
        };
        if !(MIN_YEAR..=self.current_year).contains(&year) {
            warn!(raw, year, max = self.current_year, "Date year out of range");
            return None;
        }

        let date = NaiveDate::from_ymd_opt(year, month, day);
        match date {
            Some(d) => debug!(raw, date = %d, as_printed = %to_source_format(d), era, "Normalized date"),
            None => warn!(raw, year, month, day, "Date is not a valid calendar day"),
        }
        date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComponentError {
    NonNumeric,
    TooLarge,
}

/// Parse one dot-separated component. Only ASCII digits are accepted, so a
/// parse failure after the digit check can only mean overflow.
fn parse_component(s: &str) -> Result<u32, ComponentError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ComponentError::NonNumeric);
    }
    s.parse().map_err(|_| ComponentError::TooLarge)
}

/// Render a date the way topic pages print it (`YYYY.MM.DD`, no brackets).
pub fn to_source_format(date: NaiveDate) -> String {
    date.format("%Y.%m.%d").to_string()
}

/// Display form stored in `date_str`: `YYYY-MM-DD`, or empty when missing.
pub fn display(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
