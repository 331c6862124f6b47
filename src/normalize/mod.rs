//! Conversion of journal entries into sink documents.
//!
//! Normalization is pure: the same entry and configuration always produce
//! the same document, including its identifier.

mod document;

pub use document::{FieldValue, NormalizedDocument};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use snafu::prelude::*;
use std::collections::BTreeMap;

use crate::emit;
use crate::error::{MissingMessageSnafu, NormalizeError, TimestampOutOfRangeSnafu};
use crate::metrics::events::StructuredParseSkipped;
use crate::source::RawEntry;

/// Field holding the primary message text.
pub const MESSAGE_FIELD: &str = "MESSAGE";

/// Metadata key under which the raw cursor is kept.
pub const CURSOR_KEY: &str = "__CURSOR";

/// Options that change how entries are normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizerConfig {
    /// Try to parse each message as a JSON object.
    pub parse_json_messages: bool,
}

/// Turns `RawEntry` values into `NormalizedDocument` values.
#[derive(Debug, Clone, Default)]
pub struct EntryNormalizer {
    config: NormalizerConfig,
}

impl EntryNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Normalize a single entry.
    ///
    /// Fails if the entry has no `MESSAGE` field or its realtime timestamp
    /// is outside the range chrono can represent.
    pub fn format(&self, entry: &RawEntry) -> Result<NormalizedDocument, NormalizeError> {
        let mut journal: BTreeMap<String, FieldValue> = entry
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), FieldValue::coerce(value)))
            .collect();
        journal.insert(
            CURSOR_KEY.to_string(),
            FieldValue::Text(entry.cursor.clone()),
        );

        // MESSAGE is always text, never the coerced integer.
        journal.remove(MESSAGE_FIELD);
        let message = entry
            .field(MESSAGE_FIELD)
            .context(MissingMessageSnafu {
                cursor: entry.cursor.as_str(),
                field: MESSAGE_FIELD,
            })?
            .to_string();

        let timestamp = realtime_to_utc(entry)?;

        let structured = if self.config.parse_json_messages {
            parse_structured(&message)
        } else {
            None
        };

        Ok(NormalizedDocument {
            id: document_id(&entry.cursor),
            timestamp,
            journal,
            message,
            structured,
        })
    }
}

/// Derive the document identifier for a cursor: hex-encoded SHA-256.
pub fn document_id(cursor: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cursor.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn realtime_to_utc(entry: &RawEntry) -> Result<DateTime<Utc>, NormalizeError> {
    i64::try_from(entry.realtime_timestamp)
        .ok()
        .and_then(DateTime::from_timestamp_micros)
        .context(TimestampOutOfRangeSnafu {
            cursor: entry.cursor.as_str(),
            micros: entry.realtime_timestamp,
        })
}

fn parse_structured(message: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Map<String, Value>>(message) {
        Ok(object) => Some(object),
        Err(_) => {
            emit!(StructuredParseSkipped);
            None
        }
    }
}
