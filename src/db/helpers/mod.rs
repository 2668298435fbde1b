use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

pub fn to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_usize(value: i64, field: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

/// Minutes are stored as whole milliseconds.
pub fn minutes_to_ms(minutes: f64) -> i64 {
    if minutes.is_finite() && minutes > 0.0 {
        (minutes * 60_000.0).round() as i64
    } else {
        0
    }
}

pub fn ms_to_minutes(ms: i64) -> f64 {
    ms.max(0) as f64 / 60_000.0
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_conversion_is_millisecond_exact() {
        assert_eq!(minutes_to_ms(6.5), 390_000);
        assert_eq!(ms_to_minutes(390_000), 6.5);
        assert_eq!(minutes_to_ms(-2.0), 0);
        assert_eq!(minutes_to_ms(f64::NAN), 0);
    }

    #[test]
    fn rejects_negative_indices() {
        assert!(to_usize(-1, "final_segment_index").is_err());
        assert_eq!(to_usize(3, "final_segment_index").unwrap(), 3);
    }
}
