//! The document shape handed to sinks.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A metadata value after integer coercion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

impl FieldValue {
    /// Store `value` as an integer if it is a complete base-10 `i64`.
    ///
    /// Leading zeros are dropped (`"0700"` becomes `700`) and numerals outside
    /// the `i64` range stay text.
    pub fn coerce(value: &str) -> Self {
        match value.parse::<i64>() {
            Ok(n) => FieldValue::Integer(n),
            Err(_) => FieldValue::Text(value.to_string()),
        }
    }
}

/// A normalized journal entry, ready for indexing.
///
/// Serializes to the document body; `id` travels separately as the
/// document identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedDocument {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "@timestamp", serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub journal: BTreeMap<String, FieldValue>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<Map<String, Value>>,
}

impl NormalizedDocument {
    /// The timestamp as written to the sink, e.g. `2016-07-29T21:04:26.424Z`.
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce() {
        assert_eq!(FieldValue::coerce("1969"), FieldValue::Integer(1969));
        assert_eq!(FieldValue::coerce("-42"), FieldValue::Integer(-42));
        assert_eq!(FieldValue::coerce("+7"), FieldValue::Integer(7));
        assert_eq!(FieldValue::coerce("0700"), FieldValue::Integer(700));
        assert_eq!(
            FieldValue::coerce("9223372036854775807"),
            FieldValue::Integer(i64::MAX)
        );
        assert_eq!(
            FieldValue::coerce("9223372036854775808"),
            FieldValue::Text("9223372036854775808".to_string())
        );
        assert_eq!(FieldValue::coerce("12ab"), FieldValue::Text("12ab".to_string()));
        assert_eq!(FieldValue::coerce(" 12"), FieldValue::Text(" 12".to_string()));
        assert_eq!(FieldValue::coerce("1.5"), FieldValue::Text("1.5".to_string()));
        assert_eq!(FieldValue::coerce(""), FieldValue::Text(String::new()));
    }

    #[test]
    fn test_document_body() {
        let mut journal = BTreeMap::new();
        journal.insert("_PID".to_string(), FieldValue::Integer(1969));
        journal.insert("__CURSOR".to_string(), FieldValue::Text("c".to_string()));

        let doc = NormalizedDocument {
            id: "abc".to_string(),
            timestamp: DateTime::from_timestamp_micros(0x538cc987de325).unwrap(),
            journal,
            message: "hello".to_string(),
            structured: None,
        };

        let body = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "@timestamp": "2016-07-29T21:04:26.424Z",
                "journal": {"_PID": 1969, "__CURSOR": "c"},
                "message": "hello",
            })
        );
    }
}
