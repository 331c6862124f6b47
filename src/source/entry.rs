//! Raw journal records.

use std::collections::BTreeMap;

/// A single record as read from the journal.
///
/// `cursor` is an opaque token that orders records. Field values are the
/// record's data fields; address fields (`__CURSOR`, timestamps) are not
/// repeated in `fields`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Opaque position token.
    pub cursor: String,
    /// Data fields of the record.
    pub fields: BTreeMap<String, String>,
    /// Wallclock time in microseconds since the Unix epoch.
    pub realtime_timestamp: u64,
    /// Monotonic time in microseconds since boot.
    pub monotonic_timestamp: u64,
}

impl RawEntry {
    /// Create an entry with no fields.
    pub fn new(cursor: impl Into<String>, realtime_timestamp: u64) -> Self {
        Self {
            cursor: cursor.into(),
            fields: BTreeMap::new(),
            realtime_timestamp,
            monotonic_timestamp: 0,
        }
    }

    /// Add a field, replacing any existing value.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_monotonic_timestamp(mut self, micros: u64) -> Self {
        self.monotonic_timestamp = micros;
        self
    }

    /// Look up a field value.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}
