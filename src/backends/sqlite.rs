//! SQLite database backend implementation
//!
//! This module provides a SQLite implementation of the [`Backend`] trait on
//! top of `rusqlite`, including schema introspection over `sqlite_master`
//! and the table-info pragmas.

use crate::core::{
    command::{Command, Parameter},
    database::{Backend, ColumnInfo, ConnectionConfig, ForeignKeyInfo, SchemaIntrospection},
    database_types::DatabaseType,
    error::{DatabaseError, Result},
    type_map::{DbType, ParamType, TypeMap},
    value::{DatabaseResult, DatabaseRow, DatabaseValue},
};
use rusqlite::{ffi, params_from_iter, Connection, Row};

/// SQLite database implementation
pub struct SqliteBackend {
    connection: Option<Connection>,
    type_map: TypeMap,
}

impl SqliteBackend {
    /// Create a new, unconnected SQLite backend
    pub fn new() -> Self {
        Self {
            connection: None,
            type_map: Self::sqlite_type_map(),
        }
    }

    /// SQLite's affinity-based translation table
    pub fn sqlite_type_map() -> TypeMap {
        TypeMap::new(&[
            (DbType::Char, "CHAR", ParamType::String),
            (DbType::Varchar, "VARCHAR", ParamType::String),
            (DbType::Text, "TEXT", ParamType::String),
            (DbType::TinyInt, "TINYINT", ParamType::Integer),
            (DbType::SmallInt, "SMALLINT", ParamType::Integer),
            (DbType::Int, "INTEGER", ParamType::Integer),
            (DbType::BigInt, "BIGINT", ParamType::Integer),
            (DbType::Decimal, "NUMERIC", ParamType::Double),
            (DbType::Float, "REAL", ParamType::Double),
            (DbType::Double, "DOUBLE", ParamType::Double),
            (DbType::Bool, "BOOLEAN", ParamType::Integer),
            (DbType::Date, "DATE", ParamType::String),
            (DbType::Time, "TIME", ParamType::String),
            (DbType::DateTime, "DATETIME", ParamType::String),
            (DbType::Timestamp, "TIMESTAMP", ParamType::Integer),
            (DbType::Binary, "BLOB", ParamType::Blob),
        ])
    }

    fn handle(&self) -> Result<&Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| DatabaseError::connection("Not connected to database"))
    }

    /// Convert a rusqlite Row to a DatabaseRow
    fn row_to_database_row(row: &Row) -> rusqlite::Result<DatabaseRow> {
        let mut db_row = DatabaseRow::new();
        let column_count = row.as_ref().column_count();

        for i in 0..column_count {
            let column_name = row.as_ref().column_name(i)?.to_string();
            let value = match row.get_ref(i)? {
                rusqlite::types::ValueRef::Null => DatabaseValue::Null,
                rusqlite::types::ValueRef::Integer(v) => DatabaseValue::Long(v),
                rusqlite::types::ValueRef::Real(v) => DatabaseValue::Double(v),
                rusqlite::types::ValueRef::Text(v) => {
                    DatabaseValue::String(String::from_utf8_lossy(v).to_string())
                }
                rusqlite::types::ValueRef::Blob(v) => DatabaseValue::Bytes(v.to_vec()),
            };
            db_row.insert(column_name, value);
        }

        Ok(db_row)
    }

    /// Convert DatabaseValue to rusqlite parameter as-is
    fn value_to_param(value: &DatabaseValue) -> Box<dyn rusqlite::ToSql> {
        match value {
            DatabaseValue::Null => Box::new(None::<i64>),
            DatabaseValue::Bool(v) => Box::new(*v),
            DatabaseValue::Int(v) => Box::new(*v),
            DatabaseValue::Long(v) => Box::new(*v),
            DatabaseValue::Float(v) => Box::new(*v),
            DatabaseValue::Double(v) => Box::new(*v),
            DatabaseValue::String(v) => Box::new(v.clone()),
            DatabaseValue::Bytes(v) => Box::new(v.clone()),
            DatabaseValue::Timestamp(v) => Box::new(*v),
        }
    }

    /// Convert a parameter according to its wire type
    ///
    /// Values that do not convert are bound unchanged and left to SQLite's
    /// type affinity.
    fn bind_parameter(&self, parameter: &Parameter) -> Box<dyn rusqlite::ToSql> {
        let value = &parameter.value;
        let param_type = match parameter.db_type {
            Some(db_type) => self.type_map.param_type(db_type),
            None => ParamType::infer(value),
        };
        match (param_type, value) {
            (_, DatabaseValue::Null) => Box::new(None::<i64>),
            (ParamType::Integer, v) => match v.as_long() {
                Some(n) => Box::new(n),
                None => Self::value_to_param(v),
            },
            (ParamType::Double, v) => match v.as_double() {
                Some(n) => Box::new(n),
                None => Self::value_to_param(v),
            },
            (ParamType::String, DatabaseValue::Bytes(b)) => Box::new(b.clone()),
            (ParamType::String, DatabaseValue::String(s)) => Box::new(s.clone()),
            (ParamType::String, DatabaseValue::Timestamp(_)) => match value.as_datetime() {
                Some(dt) => Box::new(dt.to_rfc3339()),
                None => Self::value_to_param(value),
            },
            (ParamType::String, v) => Box::new(v.as_string()),
            (ParamType::Blob, v) => Self::value_to_param(v),
        }
    }

    fn bind(&self, command: &Command) -> Vec<Box<dyn rusqlite::ToSql>> {
        command
            .parameters()
            .iter()
            .map(|p| self.bind_parameter(p))
            .collect()
    }

    fn run_literal(&self, sql: &str) -> Result<()> {
        self.handle()?
            .execute_batch(sql)
            .map_err(|e| map_error(e, sql))
    }
}

impl Default for SqliteBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate a driver error, singling out unique-constraint violations
fn map_error(err: rusqlite::Error, sql: &str) -> DatabaseError {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
            || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return DatabaseError::duplicate_key(
                message.clone().unwrap_or_else(|| err.to_string()),
            );
        }
    }
    DatabaseError::query_execute(err.to_string(), sql)
}

/// Length suffix of a declared type, e.g. 50 for `VARCHAR(50)`
fn declared_length(sql_type: &str) -> Option<usize> {
    let (_, rest) = sql_type.split_once('(')?;
    rest.split([',', ')']).next()?.trim().parse().ok()
}

impl Backend for SqliteBackend {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn connect(&mut self, config: &ConnectionConfig) -> Result<()> {
        // Clean up any existing connection first
        self.connection = None;

        let path = config.connection_string();
        let conn = Connection::open(&path)
            .map_err(|e| DatabaseError::connection(format!("{}: {}", path, e)))?;

        // Enable foreign keys
        conn.execute_batch("PRAGMA foreign_keys = ON")
            .map_err(|e| DatabaseError::connection(e.to_string()))?;

        self.connection = Some(conn);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.connection.take() {
            conn.close()
                .map_err(|(_, e)| DatabaseError::connection(e.to_string()))?;
        }
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.run_literal("BEGIN TRANSACTION")
    }

    fn commit(&mut self) -> Result<()> {
        self.run_literal("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.run_literal("ROLLBACK")
    }

    fn query(&mut self, command: &Command) -> Result<DatabaseResult> {
        let conn = self.handle()?;
        let sql = command.text();
        let params = self.bind(command);
        let mut stmt = conn.prepare(sql).map_err(|e| map_error(e, sql))?;

        let mapped = if command.has_parameters() {
            stmt.query_map(params_from_iter(params.iter()), Self::row_to_database_row)
        } else {
            stmt.query_map([], Self::row_to_database_row)
        };
        let rows = mapped
            .map_err(|e| map_error(e, sql))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| map_error(e, sql))?;
        Ok(rows)
    }

    fn execute(&mut self, command: &Command) -> Result<u64> {
        let conn = self.handle()?;
        let sql = command.text();

        let result = if command.has_parameters() {
            let params = self.bind(command);
            conn.prepare(sql)
                .and_then(|mut stmt| stmt.execute(params_from_iter(params.iter())))
        } else {
            conn.execute(sql, [])
        };
        let affected = result.map_err(|e| map_error(e, sql))?;

        Ok(affected as u64)
    }

    fn last_insert_id(&mut self) -> Result<DatabaseValue> {
        Ok(DatabaseValue::Long(self.handle()?.last_insert_rowid()))
    }

    fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    fn introspection(&mut self) -> Option<&mut dyn SchemaIntrospection> {
        Some(self)
    }
}

impl SchemaIntrospection for SqliteBackend {
    fn schemas(&mut self) -> Result<Vec<String>> {
        let rows = self.query(&Command::new("PRAGMA database_list"))?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("name").map(DatabaseValue::as_string))
            .collect())
    }

    fn tables(&mut self, schema: Option<&str>) -> Result<Vec<String>> {
        let master = match schema {
            Some(schema) => format!("{}.sqlite_master", DatabaseType::Sqlite.quote_identifier(schema)),
            None => "sqlite_master".to_string(),
        };
        let sql = format!(
            "SELECT name FROM {} WHERE type IN ('table', 'view') \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
            master
        );
        let rows = self.query(&Command::new(sql))?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get_index(0).map(DatabaseValue::as_string))
            .collect())
    }

    fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        let sql = format!(
            "PRAGMA table_info({})",
            DatabaseType::Sqlite.quote_identifier(table)
        );
        let rows = self.query(&Command::new(sql))?;
        if rows.is_empty() {
            return Err(DatabaseError::key_not_found(format!("table '{}'", table)));
        }

        Ok(rows
            .iter()
            .map(|row| {
                let text = |column: &str| row.get(column).map(DatabaseValue::as_string).unwrap_or_default();
                let flag = |column: &str| row.get(column).and_then(DatabaseValue::as_long).unwrap_or(0);
                let sql_type = text("type");
                ColumnInfo {
                    name: text("name"),
                    db_type: self.type_map.db_type(&sql_type),
                    length: declared_length(&sql_type),
                    nullable: flag("notnull") == 0,
                    default_value: row
                        .get("dflt_value")
                        .filter(|v| !v.is_null())
                        .map(DatabaseValue::as_string),
                    is_primary_key: flag("pk") > 0,
                    sql_type,
                }
            })
            .collect())
    }

    fn primary_keys(&mut self, table: &str) -> Result<Vec<String>> {
        let sql = format!(
            "PRAGMA table_info({})",
            DatabaseType::Sqlite.quote_identifier(table)
        );
        let rows = self.query(&Command::new(sql))?;
        let mut keys: Vec<(i64, String)> = rows
            .iter()
            .filter_map(|row| {
                let position = row.get("pk").and_then(DatabaseValue::as_long)?;
                let name = row.get("name")?.as_string();
                (position > 0).then_some((position, name))
            })
            .collect();
        keys.sort_by_key(|(position, _)| *position);
        Ok(keys.into_iter().map(|(_, name)| name).collect())
    }

    fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        let sql = format!(
            "PRAGMA foreign_key_list({})",
            DatabaseType::Sqlite.quote_identifier(table)
        );
        let rows = self.query(&Command::new(sql))?;
        Ok(rows
            .iter()
            .map(|row| {
                let text = |column: &str| row.get(column).map(DatabaseValue::as_string).unwrap_or_default();
                ForeignKeyInfo {
                    column: text("from"),
                    referenced_table: text("table"),
                    referenced_column: text("to"),
                }
            })
            .collect())
    }

    fn table_ddl(&mut self, table: &str) -> Result<Option<String>> {
        let command = Command::with_parameters(
            "SELECT sql FROM sqlite_master WHERE name = ?",
            vec![Parameter::new("name", Some(DbType::Text), table.into())],
        );
        let rows = self.query(&command)?;
        Ok(rows
            .first()
            .and_then(|row| row.get_index(0))
            .filter(|v| !v.is_null())
            .map(DatabaseValue::as_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> SqliteBackend {
        let mut db = SqliteBackend::new();
        db.connect(&ConnectionConfig::in_memory()).unwrap();
        db.execute(&Command::new(
            "CREATE TABLE test (id INTEGER PRIMARY KEY, name VARCHAR(20) NOT NULL UNIQUE, score REAL DEFAULT 0)",
        ))
        .unwrap();
        db
    }

    fn insert(db: &mut SqliteBackend, name: &str) -> Result<u64> {
        db.execute(&Command::with_parameters(
            "INSERT INTO test (name) VALUES (?)",
            vec![Parameter::new("name", Some(DbType::Varchar), name.into())],
        ))
    }

    #[test]
    fn test_sqlite_connect() {
        let mut db = SqliteBackend::new();
        assert!(db.connect(&ConnectionConfig::in_memory()).is_ok());
        assert!(db.handle().is_ok());
        assert!(db.close().is_ok());
        assert!(db.handle().is_err());
    }

    #[test]
    fn test_sqlite_execute_and_query() -> Result<()> {
        let mut db = connected();
        assert_eq!(insert(&mut db, "Alice")?, 1);
        assert_eq!(db.last_insert_id()?, DatabaseValue::Long(1));
        insert(&mut db, "Bob")?;

        let results = db.query(&Command::new("SELECT name, id FROM test ORDER BY id"))?;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].get("name").map(DatabaseValue::as_string).as_deref(), Some("Alice"));
        // column order is preserved
        assert_eq!(results[1].get_index(1), Some(&DatabaseValue::Long(2)));
        Ok(())
    }

    #[test]
    fn test_typed_binding_coerces() -> Result<()> {
        let mut db = connected();
        insert(&mut db, "Alice")?;

        // a string bound as an integer key still matches
        let command = Command::with_parameters(
            "SELECT name FROM test WHERE id = ?",
            vec![Parameter::new("id", Some(DbType::Int), "1".into())],
        );
        let rows = db.query(&command)?;
        assert_eq!(rows.len(), 1);

        let command = Command::with_parameters(
            "UPDATE test SET score = ? WHERE id = ?",
            vec![
                Parameter::new("score", Some(DbType::Double), DatabaseValue::Long(3)),
                Parameter::new("id", None, DatabaseValue::Long(1)),
            ],
        );
        assert_eq!(db.execute(&command)?, 1);
        let rows = db.query(&Command::new("SELECT score FROM test"))?;
        assert_eq!(rows[0].get("score"), Some(&DatabaseValue::Double(3.0)));
        Ok(())
    }

    #[test]
    fn test_duplicate_key_is_distinguished() {
        let mut db = connected();
        insert(&mut db, "Alice").unwrap();
        let err = insert(&mut db, "Alice").unwrap_err();
        assert!(err.is_duplicate_key(), "{err}");

        let err = db.execute(&Command::new("INSERT INTO missing VALUES (1)")).unwrap_err();
        assert!(matches!(err, DatabaseError::QueryExecute { .. }));
    }

    #[test]
    fn test_sqlite_transaction() -> Result<()> {
        let mut db = connected();

        db.begin_transaction()?;
        insert(&mut db, "Alice")?;
        db.commit()?;

        db.begin_transaction()?;
        insert(&mut db, "Bob")?;
        db.rollback()?;

        let results = db.query(&Command::new("SELECT * FROM test"))?;
        assert_eq!(results.len(), 1); // Still only Alice
        Ok(())
    }

    #[test]
    fn test_introspection() -> Result<()> {
        let mut db = connected();
        db.execute(&Command::new(
            "CREATE TABLE child (id INTEGER PRIMARY KEY, test_id INTEGER REFERENCES test(id), payload BLOB)",
        ))?;

        assert!(db.schemas()?.contains(&"main".to_string()));
        assert_eq!(db.tables(None)?, vec!["child", "test"]);
        assert_eq!(db.tables(Some("main"))?.len(), 2);

        let columns = db.columns("test")?;
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[1].name, "name");
        assert_eq!(columns[1].db_type, Some(DbType::Varchar));
        assert_eq!(columns[1].length, Some(20));
        assert!(!columns[1].nullable);
        assert!(columns[0].is_primary_key);
        assert_eq!(columns[2].default_value.as_deref(), Some("0"));

        assert_eq!(db.primary_keys("test")?, vec!["id"]);
        assert_eq!(
            db.foreign_keys("child")?,
            vec![ForeignKeyInfo {
                column: "test_id".into(),
                referenced_table: "test".into(),
                referenced_column: "id".into(),
            }]
        );
        assert!(db.table_ddl("test")?.unwrap().starts_with("CREATE TABLE test"));
        assert_eq!(db.table_ddl("nope")?, None);
        assert!(matches!(db.columns("nope"), Err(DatabaseError::KeyNotFound(_))));
        Ok(())
    }

    #[test]
    fn test_declared_length() {
        assert_eq!(declared_length("VARCHAR(50)"), Some(50));
        assert_eq!(declared_length("DECIMAL(10, 2)"), Some(10));
        assert_eq!(declared_length("TEXT"), None);
    }
}
