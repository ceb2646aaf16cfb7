use chrono::{DateTime, NaiveDate, SecondsFormat};

use crate::model::{Ms, Period};

pub const DAY_MS: Ms = 86_400_000;

/// 00:00:00.000 UTC of the calendar day containing `ms`.
pub fn start_of_day(ms: Ms) -> Ms {
    ms.saturating_sub(ms.rem_euclid(DAY_MS))
}

/// 23:59:59.999 UTC of the calendar day containing `ms`.
pub fn end_of_day(ms: Ms) -> Ms {
    start_of_day(ms).saturating_add(DAY_MS - 1)
}

/// Round `from` down and `to` up to their UTC day boundaries.
/// Absent bounds stay absent.
pub fn normalize(period: Period) -> Period {
    Period {
        from: period.from.map(start_of_day),
        to: period.to.map(end_of_day),
    }
}

/// Parse a raw date literal: `YYYY-MM-DD`, RFC 3339, or integer milliseconds.
pub fn parse_date(raw: &str) -> Option<Ms> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<Ms>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_milli_opt(0, 0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

pub fn format_date(ms: Ms) -> String {
    match DateTime::from_timestamp_millis(ms) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => ms.to_string(),
    }
}
