//! Lenient numeric decoding for backend payloads.
//!
//! The REST backend serializes decimals as strings (`"150.00"`), the market
//! feed sends plain JSON numbers, and some fields are `null`. These helpers
//! accept all three and map anything unusable to `None` instead of failing
//! the whole payload.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Interpret a JSON value as a finite `f64`.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Interpret a JSON value as a unix timestamp in milliseconds.
///
/// Integers and numeric strings pass through; RFC 3339 strings and plain
/// `YYYY-MM-DD` dates are converted.
pub fn value_to_timestamp_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

pub(crate) fn parse_timestamp_str(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc().timestamp_millis());
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

pub fn de_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_f64))
}

pub fn de_opt_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_timestamp_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_and_numeric_strings() {
        assert_eq!(value_to_f64(&json!(12.5)), Some(12.5));
        assert_eq!(value_to_f64(&json!("150.00")), Some(150.0));
        assert_eq!(value_to_f64(&json!(" 7 ")), Some(7.0));
        assert_eq!(value_to_f64(&json!("abc")), None);
        assert_eq!(value_to_f64(&json!(null)), None);
        assert_eq!(value_to_f64(&json!(true)), None);
    }

    #[test]
    fn timestamps_from_various_shapes() {
        assert_eq!(value_to_timestamp_ms(&json!(1_700_000_000_000i64)), Some(1_700_000_000_000));
        assert_eq!(value_to_timestamp_ms(&json!("1700000000000")), Some(1_700_000_000_000));
        assert_eq!(
            value_to_timestamp_ms(&json!("2024-01-02")),
            Some(1_704_153_600_000)
        );
        assert_eq!(
            value_to_timestamp_ms(&json!("2024-01-02T00:00:00Z")),
            Some(1_704_153_600_000)
        );
        assert_eq!(value_to_timestamp_ms(&json!("yesterday")), None);
    }
}
