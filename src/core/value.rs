//! Database value types
//!
//! This module defines the scalar values that flow between entities,
//! commands and backend rows.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Database value that can hold different types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum DatabaseValue {
    /// Null value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// String value
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Timestamp (Unix timestamp in microseconds)
    Timestamp(i64),
}

impl DatabaseValue {
    /// Get the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DatabaseValue::Bool(v) => Some(*v),
            DatabaseValue::Int(v) => Some(*v != 0),
            DatabaseValue::Long(v) => Some(*v != 0),
            DatabaseValue::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Get the value as an i32
    pub fn as_int(&self) -> Option<i32> {
        match self {
            DatabaseValue::Int(v) => Some(*v),
            DatabaseValue::Long(v) => i32::try_from(*v).ok(),
            DatabaseValue::Float(v) => Some(*v as i32),
            DatabaseValue::Double(v) => Some(*v as i32),
            DatabaseValue::String(s) => s.trim().parse().ok(),
            DatabaseValue::Bool(v) => Some(*v as i32),
            _ => None,
        }
    }

    /// Get the value as an i64
    pub fn as_long(&self) -> Option<i64> {
        match self {
            DatabaseValue::Long(v) => Some(*v),
            DatabaseValue::Int(v) => Some(*v as i64),
            DatabaseValue::Float(v) => Some(*v as i64),
            DatabaseValue::Double(v) => Some(*v as i64),
            DatabaseValue::String(s) => s.trim().parse().ok(),
            DatabaseValue::Bool(v) => Some(*v as i64),
            DatabaseValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as an f64
    pub fn as_double(&self) -> Option<f64> {
        match self {
            DatabaseValue::Double(v) => Some(*v),
            DatabaseValue::Float(v) => Some(*v as f64),
            DatabaseValue::Int(v) => Some(*v as f64),
            DatabaseValue::Long(v) => Some(*v as f64),
            DatabaseValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get the value as a string slice without conversion
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the value as a string (with conversion)
    pub fn as_string(&self) -> String {
        match self {
            DatabaseValue::Null => "null".to_string(),
            DatabaseValue::Bool(v) => v.to_string(),
            DatabaseValue::Int(v) => v.to_string(),
            DatabaseValue::Long(v) => v.to_string(),
            DatabaseValue::Float(v) => v.to_string(),
            DatabaseValue::Double(v) => v.to_string(),
            DatabaseValue::String(s) => s.clone(),
            DatabaseValue::Bytes(b) => format!("<{} bytes>", b.len()),
            DatabaseValue::Timestamp(v) => v.to_string(),
        }
    }

    /// Get the value as bytes (zero-copy)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DatabaseValue::Bytes(b) => Some(b),
            DatabaseValue::String(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Get a timestamp value as a UTC date-time
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            DatabaseValue::Timestamp(micros) => Utc.timestamp_micros(*micros).single(),
            DatabaseValue::Long(secs) => Utc.timestamp_opt(*secs, 0).single(),
            DatabaseValue::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Null, an empty string or empty bytes
    pub fn is_empty(&self) -> bool {
        match self {
            DatabaseValue::Null => true,
            DatabaseValue::String(s) => s.is_empty(),
            DatabaseValue::Bytes(b) => b.is_empty(),
            _ => false,
        }
    }

    /// The "not yet assigned" marker for server-generated keys: empty or zero
    pub fn is_zero_or_empty(&self) -> bool {
        match self {
            DatabaseValue::Int(v) => *v == 0,
            DatabaseValue::Long(v) => *v == 0,
            DatabaseValue::String(s) => s.is_empty() || s == "0",
            other => other.is_empty(),
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            DatabaseValue::Null => "null",
            DatabaseValue::Bool(_) => "bool",
            DatabaseValue::Int(_) => "int",
            DatabaseValue::Long(_) => "long",
            DatabaseValue::Float(_) => "float",
            DatabaseValue::Double(_) => "double",
            DatabaseValue::String(_) => "string",
            DatabaseValue::Bytes(_) => "bytes",
            DatabaseValue::Timestamp(_) => "timestamp",
        }
    }

    /// Convert into a JSON value for data-source export
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            DatabaseValue::Null => Value::Null,
            DatabaseValue::Bool(v) => Value::Bool(*v),
            DatabaseValue::Int(v) => Value::from(*v),
            DatabaseValue::Long(v) => Value::from(*v),
            DatabaseValue::Float(v) => Value::from(*v as f64),
            DatabaseValue::Double(v) => Value::from(*v),
            DatabaseValue::String(s) => Value::String(s.clone()),
            DatabaseValue::Bytes(b) => Value::from(b.clone()),
            DatabaseValue::Timestamp(v) => self
                .as_datetime()
                .map(|dt| Value::String(dt.to_rfc3339()))
                .unwrap_or_else(|| Value::from(*v)),
        }
    }

    /// Build a value from JSON; arrays of small integers become bytes
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => DatabaseValue::Null,
            Value::Bool(v) => DatabaseValue::Bool(*v),
            Value::Number(n) => match n.as_i64() {
                Some(i) => DatabaseValue::Long(i),
                None => n
                    .as_f64()
                    .map(DatabaseValue::Double)
                    .unwrap_or(DatabaseValue::Null),
            },
            Value::String(s) => DatabaseValue::String(s.clone()),
            Value::Array(items) => DatabaseValue::Bytes(
                items
                    .iter()
                    .filter_map(|v| v.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect(),
            ),
            Value::Object(_) => DatabaseValue::String(value.to_string()),
        }
    }
}

impl std::fmt::Display for DatabaseValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseValue::String(s) => write!(f, "'{}'", s),
            other => write!(f, "{}", other.as_string()),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(v: bool) -> Self {
        DatabaseValue::Bool(v)
    }
}

impl From<i32> for DatabaseValue {
    fn from(v: i32) -> Self {
        DatabaseValue::Int(v)
    }
}

impl From<i64> for DatabaseValue {
    fn from(v: i64) -> Self {
        DatabaseValue::Long(v)
    }
}

impl From<f32> for DatabaseValue {
    fn from(v: f32) -> Self {
        DatabaseValue::Float(v)
    }
}

impl From<f64> for DatabaseValue {
    fn from(v: f64) -> Self {
        DatabaseValue::Double(v)
    }
}

impl From<String> for DatabaseValue {
    fn from(v: String) -> Self {
        DatabaseValue::String(v)
    }
}

impl From<&str> for DatabaseValue {
    fn from(v: &str) -> Self {
        DatabaseValue::String(v.to_string())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(v: Vec<u8>) -> Self {
        DatabaseValue::Bytes(v)
    }
}

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(v: DateTime<Utc>) -> Self {
        DatabaseValue::Timestamp(v.timestamp_micros())
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// A row of results: column names and values in select-list order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseRow {
    columns: Vec<(String, DatabaseValue)>,
}

impl DatabaseRow {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, replacing the value if the name already exists
    pub fn insert(&mut self, column: impl Into<String>, value: DatabaseValue) {
        let column = column.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Look a column up by name; exact match first, then case-insensitive
    pub fn get(&self, column: &str) -> Option<&DatabaseValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(column))
            })
            .map(|(_, value)| value)
    }

    /// Take a column's value out of the row, leaving Null behind
    pub fn take(&mut self, column: &str) -> Option<DatabaseValue> {
        let index = self
            .columns
            .iter()
            .position(|(name, _)| name == column)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|(name, _)| name.eq_ignore_ascii_case(column))
            })?;
        Some(std::mem::take(&mut self.columns[index].1))
    }

    /// Value at a column position
    pub fn get_index(&self, index: usize) -> Option<&DatabaseValue> {
        self.columns.get(index).map(|(_, value)| value)
    }

    /// Whether the row has a column with this name
    pub fn contains_key(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Iterate over `(column, value)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DatabaseValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Multiple rows returned from a query
pub type DatabaseResult = Vec<DatabaseRow>;
