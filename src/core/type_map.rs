//! Domain type ↔ SQL type ↔ wire parameter type translation
//!
//! Entity fields carry a backend-neutral [`DbType`]. Each backend publishes a
//! [`TypeMap`] telling the builder which SQL type a domain type maps to and
//! which [`ParamType`] to bind its values with.

use super::value::DatabaseValue;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Backend-neutral column type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    Char,
    Varchar,
    Text,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Decimal,
    Float,
    Double,
    Bool,
    Date,
    Time,
    DateTime,
    Timestamp,
    Binary,
}

impl DbType {
    /// Whether values of this type are large binary payloads
    pub fn is_binary(&self) -> bool {
        matches!(self, DbType::Binary)
    }

    /// Whether values of this type are integers
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DbType::TinyInt | DbType::SmallInt | DbType::Int | DbType::BigInt
        )
    }

    /// Whether values of this type are character data
    pub fn is_textual(&self) -> bool {
        matches!(self, DbType::Char | DbType::Varchar | DbType::Text)
    }

    /// Coerce a loosely typed value into this domain type
    ///
    /// Values that cannot be represented are returned unchanged; the backend
    /// reports the mismatch when the value is bound.
    pub fn coerce(&self, value: DatabaseValue) -> DatabaseValue {
        if value.is_null() {
            return value;
        }
        match self {
            DbType::TinyInt | DbType::SmallInt | DbType::Int | DbType::BigInt => value
                .as_long()
                .map(DatabaseValue::Long)
                .unwrap_or(value),
            DbType::Decimal | DbType::Float | DbType::Double => value
                .as_double()
                .map(DatabaseValue::Double)
                .unwrap_or(value),
            DbType::Bool => value.as_bool().map(DatabaseValue::Bool).unwrap_or(value),
            DbType::Char | DbType::Varchar | DbType::Text => match value {
                DatabaseValue::Bytes(_) | DatabaseValue::String(_) => value,
                other => DatabaseValue::String(other.as_string()),
            },
            _ => value,
        }
    }
}

impl FromStr for DbType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "char" => Ok(DbType::Char),
            "varchar" | "string" | "nvarchar" => Ok(DbType::Varchar),
            "text" | "clob" => Ok(DbType::Text),
            "tinyint" => Ok(DbType::TinyInt),
            "smallint" => Ok(DbType::SmallInt),
            "int" | "integer" => Ok(DbType::Int),
            "bigint" => Ok(DbType::BigInt),
            "decimal" | "numeric" => Ok(DbType::Decimal),
            "float" | "real" => Ok(DbType::Float),
            "double" => Ok(DbType::Double),
            "bool" | "boolean" | "bit" => Ok(DbType::Bool),
            "date" => Ok(DbType::Date),
            "time" => Ok(DbType::Time),
            "datetime" => Ok(DbType::DateTime),
            "timestamp" => Ok(DbType::Timestamp),
            "binary" | "blob" | "varbinary" | "bytea" => Ok(DbType::Binary),
            _ => Err(format!("Unknown domain type: '{}'", s)),
        }
    }
}

/// Wire-level parameter type with its one-character tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    String,
    Integer,
    Double,
    Blob,
}

impl ParamType {
    /// The single-character code drivers use for this type
    pub fn tag(&self) -> char {
        match self {
            ParamType::String => 's',
            ParamType::Integer => 'i',
            ParamType::Double => 'd',
            ParamType::Blob => 'b',
        }
    }

    /// Best guess for a value whose domain type is unknown
    pub fn infer(value: &DatabaseValue) -> Self {
        match value {
            DatabaseValue::Bool(_)
            | DatabaseValue::Int(_)
            | DatabaseValue::Long(_)
            | DatabaseValue::Timestamp(_) => ParamType::Integer,
            DatabaseValue::Float(_) | DatabaseValue::Double(_) => ParamType::Double,
            DatabaseValue::Bytes(_) => ParamType::Blob,
            DatabaseValue::Null | DatabaseValue::String(_) => ParamType::String,
        }
    }
}

/// One row of a backend's translation table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapping {
    pub db_type: DbType,
    pub sql_type: &'static str,
    pub param_type: ParamType,
}

/// A backend's domain-type translation table
#[derive(Debug, Clone)]
pub struct TypeMap {
    entries: Vec<TypeMapping>,
}

impl TypeMap {
    /// Build a map from `(domain type, SQL type, parameter type)` triples
    pub fn new(entries: &[(DbType, &'static str, ParamType)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|&(db_type, sql_type, param_type)| TypeMapping {
                    db_type,
                    sql_type,
                    param_type,
                })
                .collect(),
        }
    }

    /// The ANSI-flavoured table shared by most backends
    pub fn standard() -> Self {
        Self::new(&[
            (DbType::Char, "CHAR", ParamType::String),
            (DbType::Varchar, "VARCHAR", ParamType::String),
            (DbType::Text, "TEXT", ParamType::String),
            (DbType::TinyInt, "TINYINT", ParamType::Integer),
            (DbType::SmallInt, "SMALLINT", ParamType::Integer),
            (DbType::Int, "INTEGER", ParamType::Integer),
            (DbType::BigInt, "BIGINT", ParamType::Integer),
            (DbType::Decimal, "DECIMAL", ParamType::Double),
            (DbType::Float, "FLOAT", ParamType::Double),
            (DbType::Double, "DOUBLE PRECISION", ParamType::Double),
            (DbType::Bool, "BOOLEAN", ParamType::Integer),
            (DbType::Date, "DATE", ParamType::String),
            (DbType::Time, "TIME", ParamType::String),
            (DbType::DateTime, "DATETIME", ParamType::String),
            (DbType::Timestamp, "TIMESTAMP", ParamType::Integer),
            (DbType::Binary, "BLOB", ParamType::Blob),
        ])
    }

    /// SQL type name for a domain type
    pub fn sql_type(&self, db_type: DbType) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|m| m.db_type == db_type)
            .map(|m| m.sql_type)
    }

    /// Wire parameter type for a domain type, defaulting to string
    pub fn param_type(&self, db_type: DbType) -> ParamType {
        self.entries
            .iter()
            .find(|m| m.db_type == db_type)
            .map(|m| m.param_type)
            .unwrap_or(ParamType::String)
    }

    /// Domain type for a SQL column type as reported by the backend
    ///
    /// Matches on the type name before any length/precision suffix.
    pub fn db_type(&self, sql_type: &str) -> Option<DbType> {
        let base = sql_type
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .to_uppercase();
        self.entries
            .iter()
            .find(|m| m.sql_type.eq_ignore_ascii_case(&base))
            .map(|m| m.db_type)
            .or_else(|| base.parse().ok())
    }

    /// All entries in declaration order
    pub fn entries(&self) -> &[TypeMapping] {
        &self.entries
    }
}

impl Default for TypeMap {
    fn default() -> Self {
        Self::standard()
    }
}
