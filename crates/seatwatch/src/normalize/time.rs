//! Permissive timestamp parsing.
//!
//! Upstream writes naive local times; they are interpreted in the configured
//! upstream offset and converted to UTC.

use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y%m%d%H%M%S",
];

fn clock_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2}):(\d{2})").expect("clock regex is valid"))
}

/// Parse an upstream timestamp, or return `None` when nothing fits.
pub fn parse_timestamp(
    raw: &str,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return localize(naive, offset);
        }
    }
    parse_clock_time(raw, offset, now)
}

/// Parse an upstream timestamp, falling back to `now`.
pub fn parse_timestamp_or_now(
    raw: Option<&str>,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    raw.and_then(|r| parse_timestamp(r, offset, now))
        .unwrap_or(now)
}

/// Find an `HH:MM` in free text and pin it to today's date in `offset`.
pub fn parse_clock_time(
    text: &str,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let caps = clock_regex().captures(text)?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2)?.as_str().parse().ok()?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let today = now.with_timezone(&offset).date_naive();
    localize(today.and_time(time), offset)
}

fn localize(naive: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
