//! Wire-to-domain field tables for the JSON payloads.
//!
//! Each DTO declares which wire key feeds which field and how the raw value is
//! coerced. Keys absent from the payload leave the field untouched. A key that
//! is present but `null` (or of an unusable type) sets the field to `None`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

/// Declare a `fn(&mut self, &Value)` that applies a wire-key table to `self`.
///
/// ```ignore
/// wire_fields! {
///     fn apply_fields for Customer {
///         "customerGid" => customer_gid: int,
///         "email" => email: text,
///     }
/// }
/// ```
macro_rules! wire_fields {
    (
        $(#[$meta:meta])*
        $vis:vis fn $name:ident for $ty:ty {
            $($wire:literal => $field:ident : $conv:ident),* $(,)?
        }
    ) => {
        impl $ty {
            $(#[$meta])*
            $vis fn $name(&mut self, json: &serde_json::Value) {
                let Some(object) = json.as_object() else {
                    return;
                };
                $(
                    if let Some(value) = object.get($wire) {
                        self.$field = $crate::mapping::$conv(value);
                    }
                )*
            }
        }
    };
}

pub(crate) use wire_fields;

pub(crate) fn int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

/// Parse the timestamp shapes the service emits (RFC 3339, with or without zone).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Array of objects found under `key`, or the payload itself when it is already an array.
pub(crate) fn list<'a>(json: &'a Value, key: &str) -> &'a [Value] {
    match json {
        Value::Array(items) => items,
        Value::Object(object) => object
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    struct Sample {
        id: Option<i64>,
        name: Option<String>,
        on: Option<bool>,
    }

    wire_fields! {
        fn apply_fields for Sample {
            "sampleId" => id: int,
            "displayName" => name: text,
            "isOn" => on: flag,
        }
    }

    fn sample() -> Sample {
        Sample {
            id: Some(0),
            name: Some(String::new()),
            on: Some(false),
        }
    }

    #[test]
    fn test_missing_keys_keep_defaults() {
        let mut s = sample();
        s.apply_fields(&json!({"sampleId": 7}));
        assert_eq!(
            s,
            Sample {
                id: Some(7),
                name: Some(String::new()),
                on: Some(false)
            }
        );
    }

    #[test]
    fn test_null_overwrites_default() {
        let mut s = sample();
        s.apply_fields(&json!({"displayName": null, "isOn": true}));
        assert_eq!(s.name, None);
        assert_eq!(s.on, Some(true));
    }

    #[test]
    fn test_non_object_payload_is_ignored() {
        let mut s = sample();
        s.apply_fields(&json!(null));
        s.apply_fields(&json!([1, 2]));
        assert_eq!(s, sample());
    }

    #[test]
    fn test_coercions() {
        assert_eq!(int(&json!("42")), Some(42));
        assert_eq!(int(&json!(3.0)), Some(3));
        assert_eq!(float(&json!(12)), Some(12.0));
        assert_eq!(text(&json!(1001)), Some("1001".to_string()));
        assert_eq!(flag(&json!("true")), Some(true));
        assert_eq!(flag(&json!({})), None);
    }

    #[test]
    fn test_timestamps() {
        let expected = Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(timestamp(&json!("2023-01-01T12:00:00Z")), Some(expected));
        assert_eq!(timestamp(&json!("2023-01-01T07:00:00-05:00")), Some(expected));
        assert_eq!(timestamp(&json!("2023-01-01T12:00:00")), Some(expected));
        assert_eq!(timestamp(&json!("yesterday")), None);
    }

    #[test]
    fn test_list_accepts_bare_or_wrapped_arrays() {
        let bare = json!([{"a": 1}]);
        let wrapped = json!({"outlets": [{"a": 1}, {"a": 2}]});
        assert_eq!(list(&bare, "outlets").len(), 1);
        assert_eq!(list(&wrapped, "outlets").len(), 2);
        assert!(list(&wrapped, "evChargers").is_empty());
        assert!(list(&json!("text"), "outlets").is_empty());
    }
}
