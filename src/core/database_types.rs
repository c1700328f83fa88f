//! Database type definitions
//!
//! This module defines the supported backends together with the SQL dialect
//! facts the query builder needs from each of them, and the concurrency
//! policy used for update/delete matching.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
#[derive(Default)]
pub enum DatabaseType {
    /// SQLite database
    #[default]
    Sqlite = 0,
    /// MySQL/MariaDB database
    Mysql = 1,
    /// PostgreSQL database
    Postgres = 2,
    /// Oracle database
    Oracle = 3,
    /// Microsoft SQL Server
    Mssql = 4,
}

impl DatabaseType {
    /// Convert database type to string representation
    pub fn to_str(&self) -> &'static str {
        match self {
            DatabaseType::Sqlite => "sqlite",
            DatabaseType::Mysql => "mysql",
            DatabaseType::Postgres => "postgres",
            DatabaseType::Oracle => "oracle",
            DatabaseType::Mssql => "mssql",
        }
    }

    /// Check if this database type supports transactions
    pub fn supports_transactions(&self) -> bool {
        true
    }

    /// Quote an identifier in this dialect's style
    ///
    /// Embedded closing quote characters are doubled.
    pub fn quote_identifier(&self, identifier: &str) -> String {
        match self {
            DatabaseType::Mysql => format!("`{}`", identifier.replace('`', "``")),
            DatabaseType::Mssql => format!("[{}]", identifier.replace(']', "]]")),
            _ => format!("\"{}\"", identifier.replace('"', "\"\"")),
        }
    }

    /// Positional placeholder for the parameter at `index` (zero-based)
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            DatabaseType::Postgres => format!("${}", index + 1),
            DatabaseType::Oracle => format!(":{}", index + 1),
            _ => "?".to_string(),
        }
    }

    /// Render the row-limit clause appended after ORDER BY
    ///
    /// Returns an empty string when neither limit nor offset is set.
    pub fn limit_clause(&self, limit: Option<usize>, offset: Option<usize>) -> String {
        match self {
            DatabaseType::Oracle | DatabaseType::Mssql => {
                if limit.is_none() && offset.is_none() {
                    return String::new();
                }
                let mut sql = format!(" OFFSET {} ROWS", offset.unwrap_or(0));
                if let Some(limit) = limit {
                    sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", limit));
                }
                sql
            }
            DatabaseType::Sqlite | DatabaseType::Mysql => match (limit, offset) {
                (Some(limit), Some(offset)) => format!(" LIMIT {} OFFSET {}", limit, offset),
                (Some(limit), None) => format!(" LIMIT {}", limit),
                // both dialects need a LIMIT before OFFSET
                (None, Some(offset)) => format!(" LIMIT -1 OFFSET {}", offset),
                (None, None) => String::new(),
            },
            DatabaseType::Postgres => {
                let mut sql = String::new();
                if let Some(limit) = limit {
                    sql.push_str(&format!(" LIMIT {}", limit));
                }
                if let Some(offset) = offset {
                    sql.push_str(&format!(" OFFSET {}", offset));
                }
                sql
            }
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for DatabaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(DatabaseType::Sqlite),
            "mysql" | "mariadb" => Ok(DatabaseType::Mysql),
            "postgres" | "postgresql" => Ok(DatabaseType::Postgres),
            "oracle" => Ok(DatabaseType::Oracle),
            "mssql" | "sqlserver" => Ok(DatabaseType::Mssql),
            _ => Err(format!("Invalid database type: '{}'", s)),
        }
    }
}

/// How update and delete statements match their target row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// Match on primary keys only; the last writer overwrites
    #[default]
    LastInWins,
    /// Match every field against its original value; a concurrent edit makes
    /// the statement affect zero rows
    FirstInWins,
}

impl FromStr for ConcurrencyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "last_in_wins" | "lastinwins" => Ok(ConcurrencyMode::LastInWins),
            "first_in_wins" | "firstinwins" => Ok(ConcurrencyMode::FirstInWins),
            _ => Err(format!("Invalid concurrency mode: '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_from_str() {
        assert_eq!(
            "postgresql".parse::<DatabaseType>().ok(),
            Some(DatabaseType::Postgres)
        );
        assert_eq!(
            "sqlite3".parse::<DatabaseType>().ok(),
            Some(DatabaseType::Sqlite)
        );
        assert_eq!(
            "MariaDB".parse::<DatabaseType>().ok(),
            Some(DatabaseType::Mysql)
        );
        assert_eq!("unknown".parse::<DatabaseType>().ok(), None);
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(DatabaseType::Sqlite.quote_identifier("Name"), "\"Name\"");
        assert_eq!(DatabaseType::Mysql.quote_identifier("Name"), "`Name`");
        assert_eq!(DatabaseType::Mssql.quote_identifier("Na]me"), "[Na]]me]");
        assert_eq!(DatabaseType::Postgres.quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(DatabaseType::Sqlite.placeholder(3), "?");
        assert_eq!(DatabaseType::Postgres.placeholder(0), "$1");
        assert_eq!(DatabaseType::Oracle.placeholder(1), ":2");
    }

    #[test]
    fn test_limit_clause() {
        assert_eq!(DatabaseType::Sqlite.limit_clause(Some(5), None), " LIMIT 5");
        assert_eq!(
            DatabaseType::Sqlite.limit_clause(None, Some(10)),
            " LIMIT -1 OFFSET 10"
        );
        assert_eq!(
            DatabaseType::Postgres.limit_clause(Some(5), Some(10)),
            " LIMIT 5 OFFSET 10"
        );
        assert_eq!(
            DatabaseType::Mssql.limit_clause(Some(5), None),
            " OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY"
        );
        assert_eq!(DatabaseType::Oracle.limit_clause(None, None), "");
    }

    #[test]
    fn test_concurrency_mode_from_str() {
        assert_eq!(
            "first_in_wins".parse::<ConcurrencyMode>().ok(),
            Some(ConcurrencyMode::FirstInWins)
        );
        assert_eq!(
            "Last-In-Wins".parse::<ConcurrencyMode>().ok(),
            Some(ConcurrencyMode::LastInWins)
        );
        assert!("whatever".parse::<ConcurrencyMode>().is_err());
        assert_eq!(ConcurrencyMode::default(), ConcurrencyMode::LastInWins);
    }
}
