use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

static RE_ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})$").unwrap());
static RE_DAY_FIRST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})[-/](\d{1,2})[-/](\d{4})$").unwrap());

/// Canonical text form for stored dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Canonical text form for stored timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a date in any of the accepted input forms.
///
/// Accepted:
/// - `2024-01-10`, `2024/01/10`: year first
/// - `10-01-2024`, `10/01/2024`: day first
/// - any timestamp accepted by [`normalize_timestamp`] (time part dropped)
pub fn normalize_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(caps) = RE_ISO.captures(s) {
        return ymd(&caps[1], &caps[2], &caps[3]);
    }
    if let Some(caps) = RE_DAY_FIRST.captures(s) {
        return ymd(&caps[3], &caps[2], &caps[1]);
    }
    normalize_timestamp(s).map(|ts| ts.date())
}

/// Parse a timestamp. A bare date is accepted and taken as midnight.
pub fn normalize_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
        "%d-%m-%Y %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%d-%m-%Y %H:%M",
        "%d/%m/%Y %H:%M",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    // RFC 3339 with offset or fractional seconds
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(ts.naive_utc());
    }
    if RE_ISO.is_match(s) || RE_DAY_FIRST.is_match(s) {
        return normalize_date(s).map(|d| d.and_time(NaiveTime::MIN));
    }
    None
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// Signed whole days from `from` to `to`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Arithmetic mean, `None` for an empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_date_forms() {
        assert_eq!(normalize_date("2024-01-10"), Some(date(2024, 1, 10)));
        assert_eq!(normalize_date("2024/1/10"), Some(date(2024, 1, 10)));
        assert_eq!(normalize_date("10-01-2024"), Some(date(2024, 1, 10)));
        assert_eq!(normalize_date("10/01/2024"), Some(date(2024, 1, 10)));
        assert_eq!(normalize_date(" 2024-01-10 08:30:00 "), Some(date(2024, 1, 10)));
    }

    #[test]
    fn test_normalize_date_rejects_garbage() {
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("   "), None);
        assert_eq!(normalize_date("2024-13-01"), None);
        assert_eq!(normalize_date("yesterday"), None);
    }

    #[test]
    fn test_normalize_timestamp() {
        let expected = date(2024, 3, 5).and_hms_opt(14, 7, 0).unwrap();
        assert_eq!(normalize_timestamp("2024-03-05 14:07:00"), Some(expected));
        assert_eq!(normalize_timestamp("2024-03-05T14:07:00"), Some(expected));
        assert_eq!(normalize_timestamp("2024-03-05 14:07"), Some(expected));
        assert_eq!(normalize_timestamp("05/03/2024 14:07:00"), Some(expected));
        assert_eq!(
            normalize_timestamp("2024-03-05"),
            Some(date(2024, 3, 5).and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(normalize_timestamp("noon"), None);
    }

    #[test]
    fn test_days_between() {
        assert_eq!(days_between(date(2024, 1, 10), date(2024, 1, 12)), 2);
        assert_eq!(days_between(date(2024, 1, 10), date(2024, 1, 9)), -1);
        assert_eq!(days_between(date(2024, 2, 28), date(2024, 3, 1)), 2); // Leap year
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(2.346, 2), 2.35);
        assert_eq!(round_to(2.344, 2), 2.34);
        assert_eq!(round_to(1.0 / 3.0, 4), 0.3333);
        assert_eq!(round_to(-1.005, 0), -1.0);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
    }
}
