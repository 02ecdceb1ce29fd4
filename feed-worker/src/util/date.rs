//! Feed date normalization.
//!
//! Feeds carry publish dates in whatever shape their CMS emits. We try the
//! standard formats first, then a loose `MM/DD/YYYY ... HH:MM` pattern read as
//! UTC, and finally fall back to the current time with a warning.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use tracing::warn;

/// Zone-less layouts accepted by the standard pass, read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Date-only layouts, read as UTC midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

static LOOSE_DATE_RE: OnceLock<Regex> = OnceLock::new();

fn loose_date_re() -> &'static Regex {
    LOOSE_DATE_RE.get_or_init(|| {
        Regex::new(r"(\d{2})/(\d{2})/(\d{4}).*?(\d{2}):(\d{2})").unwrap()
    })
}

/// A normalized feed date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub value: DateTime<Utc>,
    /// True when the input could not be read and `value` is the current time
    pub fallback: bool,
}

/// Parse a free-form feed timestamp.
///
/// Never fails: unreadable input yields the current time with `fallback` set.
pub fn parse_feed_date(raw: &str) -> ParsedDate {
    let trimmed = raw.trim();

    if let Some(value) = parse_standard(trimmed).or_else(|| parse_loose(trimmed)) {
        return ParsedDate {
            value,
            fallback: false,
        };
    }

    warn!(date = %raw, "feed_date_fallback_to_now");
    ParsedDate {
        value: Utc::now(),
        fallback: true,
    }
}

fn parse_standard(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Match `MM/DD/YYYY ... HH:MM` anywhere in the string, e.g.
/// `"Sun, 03/23/2025 - 03:23"`.
fn parse_loose(raw: &str) -> Option<DateTime<Utc>> {
    let caps = loose_date_re().captures(raw)?;

    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;
    let hour: u32 = caps[4].parse().ok()?;
    let minute: u32 = caps[5].parse().ok()?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}
