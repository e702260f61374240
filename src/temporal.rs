//! Canonical time representation and normalization of raw date/hour encodings.
//!
//! The three source feeds disagree on almost everything: dates arrive as
//! `m/d/Y H:M:S` strings with a trailing AM/PM marker, as ISO dates, or as
//! `d-m-Y`; hours arrive as bare 0-23 integers or as `HH:MM:SS` strings.
//! Everything funnels into a [`TimePoint`] with an hour bucket on the
//! 100..=2400 scale.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::error::PipelineError;

/// Date formats carrying a time-of-day component, tried in order.
/// The month-first layout is tried before the day-first one; ambiguous
/// dates like "03/04/2019" resolve to whichever matches first.
const DATETIME_FORMATS: &[&str] = &["%m/%d/%Y %H:%M:%S", "%d/%m/%Y %H:%M:%S"];

/// Date-only formats, tried after the datetime layouts.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y", "%d/%m/%Y"];

/// The 24 hourly buckets of a day, `100` (00:00-01:00] through `2400`.
pub const HOUR_BUCKETS: std::ops::RangeInclusive<u32> = 1..=24;

/// A calendar date with its hourly bucket and derived weekday flags.
///
/// Invariant: `hour` is a multiple of 100 in [100, 2400]. A raw hour of 0
/// is rewritten to 2400 so every bucket stays positive and sortable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimePoint {
    pub date: NaiveDate,
    pub hour: u32,
    /// Monday = 0 .. Sunday = 6.
    pub weekday: u32,
    pub is_weekend: bool,
}

impl TimePoint {
    /// Builds a time point from a date and a bucket hour already on the
    /// 0/100..2400 scale. Hour 0 normalizes to 2400.
    pub fn new(date: NaiveDate, hour: u32) -> Result<Self, PipelineError> {
        let hour = if hour == 0 { 2400 } else { hour };
        if hour % 100 != 0 || !(100..=2400).contains(&hour) {
            return Err(PipelineError::bad_hour(&hour.to_string()));
        }
        let weekday = date.weekday().num_days_from_monday();
        Ok(TimePoint {
            date,
            hour,
            weekday,
            is_weekend: weekday == 5 || weekday == 6,
        })
    }

    /// Parses both raw values and combines them.
    pub fn parse(raw_date: &str, raw_hour: &str) -> Result<Self, PipelineError> {
        let date = parse_date(raw_date)?;
        let hour = parse_hour(raw_hour)?;
        TimePoint::new(date, hour)
    }
}

/// Parses a raw date string.
///
/// A trailing ` AM`/` PM` marker is stripped before the format list is
/// tried; the first matching layout wins.
///
/// # Errors
///
/// [`PipelineError::Parse`] naming the raw string if no layout matches.
/// Callers must not substitute a default date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, PipelineError> {
    let trimmed = raw.trim();
    let stripped = strip_meridiem(trimmed);

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(stripped, fmt) {
            return Ok(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(stripped, fmt) {
            return Ok(d);
        }
    }
    Err(PipelineError::bad_date(raw))
}

fn strip_meridiem(s: &str) -> &str {
    let upper_end = s.to_ascii_uppercase();
    if upper_end.ends_with(" AM") || upper_end.ends_with(" PM") {
        s[..s.len() - 3].trim_end()
    } else {
        s
    }
}

/// Parses a raw hour value onto the 100..=2400 bucket scale.
///
/// `"HH:MM:SS"` truncates to `"HH:MM"`, drops the colon, and parses as an
/// integer (`"14:00:00"` becomes 1400). Bare integers in 0..=24 are
/// hour-of-day values and multiply by 100; values already on the step-100
/// scale pass through. Zero always rewrites to 2400.
pub fn parse_hour(raw: &str) -> Result<u32, PipelineError> {
    let trimmed = raw.trim();

    let value = if trimmed.contains(':') {
        let clock = trimmed.get(..5).unwrap_or(trimmed);
        clock
            .replace(':', "")
            .parse::<u32>()
            .map_err(|_| PipelineError::bad_hour(raw))?
    } else {
        let n = trimmed
            .parse::<u32>()
            .map_err(|_| PipelineError::bad_hour(raw))?;
        if n <= 24 { n * 100 } else { n }
    };

    let value = if value == 0 { 2400 } else { value };
    if value % 100 != 0 || !(100..=2400).contains(&value) {
        return Err(PipelineError::bad_hour(raw));
    }
    Ok(value)
}

/// Iterates the 24 bucket hours of a day: 100, 200, .., 2400.
pub fn bucket_hours() -> impl Iterator<Item = u32> {
    HOUR_BUCKETS.map(|h| h * 100)
}
