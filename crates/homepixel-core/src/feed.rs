//! Channel feed entries and their validation
//!
//! A [`FeedEntry`] is one record of a remote channel as returned by the
//! channel's JSON API. [`parse_entry`] projects an entry onto a
//! [`NodeSchema`], producing a [`StoredRecord`] or explaining why the entry
//! cannot be stored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::schema::{ColumnKind, ColumnSpec, FieldValue, NodeSchema, StoredRecord, TimestampSource};
use crate::schema::{STATUS_OFF, STATUS_ON};

/// Minimum number of parts a split timestamp must yield (date, time)
const TIMESTAMP_PARTS: usize = 2;

/// One record of a remote channel
///
/// Entries are immutable once fetched and compare by full structural
/// equality, which is what the client loop's cursor relies on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedEntry {
    /// Combined date and time assigned by the channel
    #[serde(default)]
    pub created_at: Option<String>,

    /// Channel-assigned sequence number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<u64>,

    /// Positional fields (`field1`..`field8`), as strings, numbers or null
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl FeedEntry {
    /// Create an entry with the given `created_at` stamp
    pub fn new(created_at: impl Into<String>) -> Self {
        Self {
            created_at: Some(created_at.into()),
            entry_id: None,
            fields: BTreeMap::new(),
        }
    }

    /// Set the entry id
    pub fn with_entry_id(mut self, entry_id: u64) -> Self {
        self.entry_id = Some(entry_id);
        self
    }

    /// Set a positional field
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Raw value of a positional field
    pub fn field(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }
}

/// Body of a channel feed response
///
/// Only the `feeds` list is used; a response without one is an empty feed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub feeds: Vec<FeedEntry>,
}

impl FeedResponse {
    /// Parse a response body
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| Error::parse(format!("Invalid feed response: {}", e)))
    }
}

/// Validate a feed entry against a schema and project it into a record
///
/// # Errors
///
/// - [`Error::Parse`] if the timestamp cannot be split into date and time
/// - [`Error::Validation`] if a text column is empty, a numeric column does
///   not parse, or a status is outside the allowed set
pub fn parse_entry(schema: &NodeSchema, entry: &FeedEntry) -> Result<StoredRecord> {
    let raw_timestamp = match schema.timestamp {
        TimestampSource::CreatedAt => entry.created_at.clone().unwrap_or_default(),
        TimestampSource::Field(field) => entry.field(field).map(value_as_text).unwrap_or_default(),
    };

    let parts = schema.timestamp.split(&raw_timestamp);
    if parts.len() < TIMESTAMP_PARTS || parts[0].is_empty() || parts[1].is_empty() {
        return Err(Error::parse(format!(
            "Unparseable date '{}'",
            raw_timestamp
        )));
    }

    let mut record = StoredRecord::new(parts[0], parts[1]);
    for column in &schema.columns {
        let value = parse_column(column, entry.field(column.field))?;
        record = record.with(column.name, value);
    }

    Ok(record)
}

fn parse_column(column: &ColumnSpec, raw: Option<&Value>) -> Result<FieldValue> {
    let raw = raw.ok_or_else(|| {
        Error::validation(format!(
            "Missing {} ({})",
            column.name, column.field
        ))
    })?;

    match column.kind {
        ColumnKind::Text => {
            let text = value_as_text(raw);
            if text.is_empty() {
                return Err(Error::validation(format!("Empty {}", column.name)));
            }
            Ok(FieldValue::Text(text))
        }
        ColumnKind::Status => {
            let status = value_as_i64(raw).ok_or_else(|| {
                Error::validation(format!("Invalid {} value: {}", column.name, raw))
            })?;
            if status != STATUS_OFF && status != STATUS_ON {
                return Err(Error::validation(format!(
                    "{} must be {} or {}, got {}",
                    column.name, STATUS_OFF, STATUS_ON, status
                )));
            }
            Ok(FieldValue::Integer(status))
        }
        ColumnKind::Real => value_as_f64(raw)
            .filter(|v| v.is_finite())
            .map(FieldValue::Real)
            .ok_or_else(|| Error::validation(format!("Invalid {} value: {}", column.name, raw))),
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
