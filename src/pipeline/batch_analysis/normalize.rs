//! Boundary normalizer: untyped upstream records → strict `LogEntry`.
//!
//! Upstream layers hand over loosely shaped JSON (log shippers, chat
//! exports, admin CRUD rows). Fields are looked up under their common
//! aliases, coerced where the intent is unambiguous, and rejected otherwise.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use super::error::NormalizeError;
use super::types::{LogEntry, LogLevel};

const MESSAGE_KEYS: &[&str] = &["message", "msg", "content", "text"];
const LEVEL_KEYS: &[&str] = &["level", "severity", "lvl"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "time", "ts", "created_at"];
const SOURCE_KEYS: &[&str] = &["source", "origin", "service", "role"];

/// Source tag used when a record carries none.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Epoch values at or above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// A record that was dropped at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Position in the input sequence.
    pub index: usize,
    pub error: NormalizeError,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedRecords {
    pub entries: Vec<LogEntry>,
    pub rejected: Vec<RejectedRecord>,
}

/// Normalize a single raw record.
pub fn normalize_record(raw: &Value) -> Result<LogEntry, NormalizeError> {
    let obj = raw.as_object().ok_or(NormalizeError::NotAnObject)?;

    let message = match first_present(obj, MESSAGE_KEYS) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(_) | None => return Err(NormalizeError::MissingField("message")),
    };
    if message.is_empty() {
        return Err(NormalizeError::EmptyMessage);
    }

    let level = match first_present(obj, LEVEL_KEYS) {
        None => LogLevel::Info,
        Some(Value::String(s)) => {
            LogLevel::from_str(s).ok_or_else(|| NormalizeError::InvalidLevel(s.clone()))?
        }
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(LogLevel::from_syslog)
            .ok_or_else(|| NormalizeError::InvalidLevel(n.to_string()))?,
        Some(other) => return Err(NormalizeError::InvalidLevel(other.to_string())),
    };

    let timestamp = match first_present(obj, TIMESTAMP_KEYS) {
        None => return Err(NormalizeError::MissingField("timestamp")),
        Some(value) => parse_timestamp(value)?,
    };

    let source = match first_present(obj, SOURCE_KEYS) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => UNKNOWN_SOURCE.to_string(),
    };

    Ok(LogEntry {
        level,
        message,
        timestamp,
        source,
    })
}

/// Normalize a sequence of raw records, keeping input order for accepted ones.
pub fn normalize_records(raw: &[Value]) -> NormalizedRecords {
    let mut out = NormalizedRecords::default();
    for (index, value) in raw.iter().enumerate() {
        match normalize_record(value) {
            Ok(entry) => out.entries.push(entry),
            Err(error) => out.rejected.push(RejectedRecord { index, error }),
        }
    }

    if !out.rejected.is_empty() {
        tracing::warn!(
            accepted = out.entries.len(),
            rejected = out.rejected.len(),
            first_error = %out.rejected[0].error,
            "Dropped malformed records at the boundary"
        );
    }
    out
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, NormalizeError> {
    match value {
        Value::String(s) => parse_timestamp_str(s.trim())
            .ok_or_else(|| NormalizeError::InvalidTimestamp(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .and_then(from_epoch)
            .ok_or_else(|| NormalizeError::InvalidTimestamp(n.to_string())),
        other => Err(NormalizeError::InvalidTimestamp(other.to_string())),
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    s.parse::<i64>().ok().and_then(from_epoch)
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_canonical_record() {
        let entry = normalize_record(&json!({
            "level": "error",
            "message": "  db connection lost ",
            "timestamp": "2026-02-20T10:00:00Z",
            "source": "api"
        }))
        .unwrap();

        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.message, "db connection lost");
        assert_eq!(entry.source, "api");
        assert_eq!(entry.timestamp, Utc.with_ymd_and_hms(2026, 2, 20, 10, 0, 0).unwrap());
    }

    #[test]
    fn accepts_chat_message_shape() {
        let entry = normalize_record(&json!({
            "role": "patient",
            "content": "My referral was never received",
            "created_at": "2026-02-20 10:15:00"
        }))
        .unwrap();

        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.source, "patient");
        assert_eq!(entry.timestamp, Utc.with_ymd_and_hms(2026, 2, 20, 10, 15, 0).unwrap());
    }

    #[test]
    fn coerces_numeric_level_and_epoch() {
        let entry = normalize_record(&json!({
            "severity": 3,
            "msg": 404,
            "ts": 1_771_581_600
        }))
        .unwrap();
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.message, "404");
        assert_eq!(entry.source, UNKNOWN_SOURCE);
        assert_eq!(entry.timestamp.timestamp(), 1_771_581_600);
    }

    #[test]
    fn epoch_millis_detected() {
        let entry = normalize_record(&json!({
            "message": "x",
            "time": 1_771_581_600_123_i64
        }))
        .unwrap();
        assert_eq!(entry.timestamp.timestamp_millis(), 1_771_581_600_123);
    }

    #[test]
    fn rfc3339_offset_converted_to_utc() {
        let entry = normalize_record(&json!({
            "message": "x",
            "timestamp": "2026-02-20T12:00:00+02:00"
        }))
        .unwrap();
        assert_eq!(entry.timestamp, Utc.with_ymd_and_hms(2026, 2, 20, 10, 0, 0).unwrap());
    }

    #[test]
    fn rejects_malformed_records() {
        assert_eq!(normalize_record(&json!("text")), Err(NormalizeError::NotAnObject));
        assert_eq!(
            normalize_record(&json!({"timestamp": "2026-02-20T10:00:00Z"})),
            Err(NormalizeError::MissingField("message"))
        );
        assert_eq!(
            normalize_record(&json!({"message": "  ", "timestamp": "2026-02-20T10:00:00Z"})),
            Err(NormalizeError::EmptyMessage)
        );
        assert_eq!(
            normalize_record(&json!({"message": "x"})),
            Err(NormalizeError::MissingField("timestamp"))
        );
        assert_eq!(
            normalize_record(&json!({"message": "x", "level": "loud", "ts": 1})),
            Err(NormalizeError::InvalidLevel("loud".into()))
        );
        assert_eq!(
            normalize_record(&json!({"message": "x", "level": 9, "ts": 1})),
            Err(NormalizeError::InvalidLevel("9".into()))
        );
        assert_eq!(
            normalize_record(&json!({"message": "x", "timestamp": "yesterday"})),
            Err(NormalizeError::InvalidTimestamp("yesterday".into()))
        );
    }

    #[test]
    fn null_fields_fall_through_to_aliases() {
        let entry = normalize_record(&json!({
            "message": null,
            "text": "fallback",
            "timestamp": "2026-02-20T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(entry.message, "fallback");
    }

    #[test]
    fn batch_normalization_keeps_order_and_indices() {
        let raw = vec![
            json!({"message": "a", "ts": 1}),
            json!({"message": "b"}),
            json!({"message": "c", "ts": 2}),
        ];
        let out = normalize_records(&raw);
        let messages: Vec<&str> = out.entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "c"]);
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].index, 1);
    }
}
