//! Node schemas
//!
//! Every node type persists the same shape of row: a `date` and `time`
//! column followed by a few node-specific columns. A [`NodeSchema`] describes
//! those columns, which channel field each one is read from, and how its
//! value is validated. The parser, the record stores and the node loop are
//! all driven by the schema, so adding a node type means adding a schema.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Status value written when an actuator is off
pub const STATUS_OFF: i64 = 0;

/// Status value written when an actuator is on
pub const STATUS_ON: i64 = 1;

/// The kinds of node in a HomePixel installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Clap-activated light
    LightClapper,
    /// PIR-triggered security camera
    SecuritySystem,
    /// Temperature sensor driving a fan
    TempSensor,
}

impl NodeKind {
    /// Short lowercase name, used as the node-id prefix
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::LightClapper => "lightclapper",
            NodeKind::SecuritySystem => "securitysystem",
            NodeKind::TempSensor => "tempsensor",
        }
    }

    /// Default table name
    pub fn table_name(&self) -> &'static str {
        match self {
            NodeKind::LightClapper => "LightClapper",
            NodeKind::SecuritySystem => "SecuritySystem",
            NodeKind::TempSensor => "TempSensor",
        }
    }

    /// Default SQLite file for this node's client
    pub fn default_db_file(&self) -> &'static str {
        match self {
            NodeKind::LightClapper => "lightclapper.db",
            NodeKind::SecuritySystem => "securitysystem.db",
            NodeKind::TempSensor => "tempsensor.db",
        }
    }

    /// The schema for this node kind
    pub fn schema(&self) -> NodeSchema {
        let base = [
            ColumnSpec::new(LOCATION_COLUMN, "field1", ColumnKind::Text),
            ColumnSpec::new(NODE_ID_COLUMN, "field2", ColumnKind::Text),
        ];

        let (timestamp, extra) = match self {
            NodeKind::LightClapper => (
                TimestampSource::CreatedAt,
                vec![ColumnSpec::new("lightStatus", "field3", ColumnKind::Status)],
            ),
            NodeKind::SecuritySystem => (TimestampSource::Field("field3"), Vec::new()),
            NodeKind::TempSensor => (
                TimestampSource::CreatedAt,
                vec![
                    ColumnSpec::new("fanStatus", "field3", ColumnKind::Status),
                    ColumnSpec::new("tempVal", "field4", ColumnKind::Real),
                ],
            ),
        };

        NodeSchema {
            kind: *self,
            table: self.table_name().to_string(),
            timestamp,
            columns: base.into_iter().chain(extra).collect(),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NodeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['_', '-'], "").as_str() {
            "lightclapper" => Ok(NodeKind::LightClapper),
            "securitysystem" => Ok(NodeKind::SecuritySystem),
            "tempsensor" => Ok(NodeKind::TempSensor),
            other => Err(Error::config(format!(
                "Unknown node kind '{}'. Supported: lightclapper, securitysystem, tempsensor",
                other
            ))),
        }
    }
}

/// Column holding the owner/room of a node
pub const LOCATION_COLUMN: &str = "location";

/// Column holding the node identifier
pub const NODE_ID_COLUMN: &str = "nodeID";

/// How a column value is typed and validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Non-empty text
    Text,
    /// Integer restricted to [`STATUS_OFF`] / [`STATUS_ON`]
    Status,
    /// Floating point reading
    Real,
}

impl ColumnKind {
    /// SQLite column type
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Status => "integer",
            ColumnKind::Real => "real",
        }
    }
}

/// One node-specific column and the channel field it is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name in the table and key in [`StoredRecord`]
    pub name: &'static str,
    /// Positional channel field (`field1`..`field8`)
    pub field: &'static str,
    /// Value type
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, field: &'static str, kind: ColumnKind) -> Self {
        Self { name, field, kind }
    }
}

/// Where the combined date/time string of an entry comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    /// The channel's own `created_at` stamp (`2020-11-21T20:05:45Z`)
    CreatedAt,
    /// A channel field written by the node (`2020-11-21 20:05:45`)
    Field(&'static str),
}

impl TimestampSource {
    /// Split a combined timestamp into its date and time parts
    pub fn split<'a>(&self, raw: &'a str) -> Vec<&'a str> {
        match self {
            TimestampSource::CreatedAt => raw.split(['T', 'Z']).collect(),
            TimestampSource::Field(_) => raw.split(' ').collect(),
        }
    }
}

/// Schema descriptor for one node type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSchema {
    pub kind: NodeKind,
    pub table: String,
    pub timestamp: TimestampSource,
    pub columns: Vec<ColumnSpec>,
}

impl NodeSchema {
    /// Use a different table name (tests keep scratch tables apart)
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The status column, if this node type has one
    pub fn status_column(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.kind == ColumnKind::Status)
    }

    /// The numeric reading column, if this node type has one
    pub fn value_column(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.kind == ColumnKind::Real)
    }

    /// Names of all persisted columns, in table order
    pub fn column_names(&self) -> Vec<&str> {
        ["date", "time"]
            .into_iter()
            .chain(self.columns.iter().map(|c| c.name))
            .collect()
    }

    /// Check a table or column name is safe to splice into SQL
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.table)?;
        for column in &self.columns {
            validate_identifier(column.name)?;
        }
        Ok(())
    }

    /// Check that a record carries every column with a usable value
    pub fn check_record(&self, record: &StoredRecord) -> Result<()> {
        if record.date.is_empty() || record.time.is_empty() {
            return Err(Error::validation("Record is missing its date or time"));
        }

        for column in &self.columns {
            match record.get(column.name) {
                None => {
                    return Err(Error::validation(format!(
                        "Record is missing column '{}'",
                        column.name
                    )));
                }
                Some(FieldValue::Text(s)) if s.is_empty() => {
                    return Err(Error::validation(format!(
                        "Column '{}' is empty",
                        column.name
                    )));
                }
                Some(value) => {
                    if !value.matches(column.kind) {
                        return Err(Error::validation(format!(
                            "Column '{}' holds {:?}, expected {:?}",
                            column.name, value, column.kind
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(Error::config(format!("Invalid SQL identifier: '{}'", name)))
    }
}

/// A single persisted column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    fn matches(&self, kind: ColumnKind) -> bool {
        match (self, kind) {
            (FieldValue::Text(_), ColumnKind::Text) => true,
            (FieldValue::Integer(v), ColumnKind::Status) => *v == STATUS_OFF || *v == STATUS_ON,
            (FieldValue::Real(v), ColumnKind::Real) => v.is_finite(),
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Real(v) => write!(f, "{}", v),
        }
    }
}

/// The locally persisted projection of a feed entry
///
/// Uniqueness is full-row equality: two readings with identical values are
/// the same record as far as the store is concerned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub date: String,
    pub time: String,
    /// Node-specific columns in schema order
    pub fields: Vec<(String, FieldValue)>,
}

impl StoredRecord {
    pub fn new(date: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            time: time.into(),
            fields: Vec::new(),
        }
    }

    /// Append a column value
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    /// Value of a column
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_clapper_schema_layout() {
        let schema = NodeKind::LightClapper.schema();
        assert_eq!(schema.table, "LightClapper");
        assert_eq!(
            schema.column_names(),
            vec!["date", "time", "location", "nodeID", "lightStatus"]
        );
        assert_eq!(schema.status_column().map(|c| c.field), Some("field3"));
        assert!(schema.value_column().is_none());
    }

    #[test]
    fn temp_sensor_has_reading_column() {
        let schema = NodeKind::TempSensor.schema();
        let value = schema.value_column().unwrap();
        assert_eq!(value.name, "tempVal");
        assert_eq!(value.field, "field4");
    }

    #[test]
    fn security_system_takes_timestamp_from_field() {
        let schema = NodeKind::SecuritySystem.schema();
        assert_eq!(schema.timestamp, TimestampSource::Field("field3"));
        assert!(schema.status_column().is_none());
        assert_eq!(
            schema.timestamp.split("2020-11-21 20:05:45"),
            vec!["2020-11-21", "20:05:45"]
        );
    }

    #[test]
    fn created_at_splits_on_t_and_z() {
        let parts = TimestampSource::CreatedAt.split("2020-11-21T20:05:45Z");
        assert_eq!(parts, vec!["2020-11-21", "20:05:45", ""]);
        assert_eq!(TimestampSource::CreatedAt.split("garbage").len(), 1);
    }

    #[test]
    fn node_kind_parsing() {
        assert_eq!("lightclapper".parse::<NodeKind>().unwrap(), NodeKind::LightClapper);
        assert_eq!("Temp_Sensor".parse::<NodeKind>().unwrap(), NodeKind::TempSensor);
        assert_eq!("security-system".parse::<NodeKind>().unwrap(), NodeKind::SecuritySystem);
        assert!("toaster".parse::<NodeKind>().is_err());
    }

    #[test]
    fn identifier_validation() {
        assert!(NodeKind::TempSensor.schema().validate().is_ok());
        let bad = NodeKind::TempSensor.schema().with_table("x; DROP TABLE y");
        assert!(bad.validate().is_err());
    }

    #[test]
    fn check_record_rejects_missing_columns() {
        let schema = NodeKind::LightClapper.schema();
        let record = StoredRecord::new("2020-11-22", "14:03:17")
            .with("lightStatus", FieldValue::Integer(STATUS_ON));

        let err = schema.check_record(&record).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn check_record_rejects_out_of_range_status() {
        let schema = NodeKind::LightClapper.schema();
        let record = StoredRecord::new("2020-11-22", "14:03:17")
            .with("location", FieldValue::text("test_room"))
            .with("nodeID", FieldValue::text("lightclapper_456"))
            .with("lightStatus", FieldValue::Integer(7));

        assert!(schema.check_record(&record).is_err());
    }

    #[test]
    fn check_record_rejects_non_finite_temperature() {
        let schema = NodeKind::TempSensor.schema();
        for temp in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let record = StoredRecord::new("2020-12-06", "16:23:14")
                .with("location", FieldValue::text("my_room"))
                .with("nodeID", FieldValue::text("tempsensor_123"))
                .with("fanStatus", FieldValue::Integer(STATUS_OFF))
                .with("tempVal", FieldValue::Real(temp));

            assert!(schema.check_record(&record).is_err());
        }
    }

    #[test]
    fn check_record_accepts_complete_record() {
        let schema = NodeKind::TempSensor.schema();
        let record = StoredRecord::new("2020-12-06", "16:23:14")
            .with("location", FieldValue::text("my_room"))
            .with("nodeID", FieldValue::text("tempsensor_123"))
            .with("fanStatus", FieldValue::Integer(STATUS_ON))
            .with("tempVal", FieldValue::Real(23.4));

        assert!(schema.check_record(&record).is_ok());
    }
}
