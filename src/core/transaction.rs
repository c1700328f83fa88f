//! Transaction guard for automatic rollback on drop
//!
//! This module provides RAII-style transaction management over a
//! [`Connection`]'s guarded transaction calls.

use super::database::Connection;
use super::error::Result;

/// Transaction guard that rolls back on drop if not committed
///
/// A guard created while the connection already has an active transaction
/// does not own it: its `commit`/`rollback`/drop leave the outer transaction
/// to whoever started it. The same applies when the backend has no
/// transaction support.
///
/// # Example
///
/// ```
/// # #[cfg(feature = "sqlite")]
/// # fn main() -> rust_table_adapter::Result<()> {
/// use rust_table_adapter::{Command, Connection, ConnectionConfig, TransactionGuard};
///
/// let conn = Connection::open(&ConnectionConfig::in_memory())?;
/// conn.execute_non_query(&Command::new("CREATE TABLE t (id INTEGER PRIMARY KEY)"))?;
///
/// let tx = TransactionGuard::begin(&conn)?;
/// conn.execute_non_query(&Command::new("INSERT INTO t DEFAULT VALUES"))?;
/// tx.commit()?;
/// # Ok(())
/// # }
/// # #[cfg(not(feature = "sqlite"))]
/// # fn main() {}
/// ```
#[must_use = "dropping the guard rolls the transaction back"]
pub struct TransactionGuard<'c> {
    connection: &'c Connection,
    owns_transaction: bool,
    finished: bool,
}

impl<'c> TransactionGuard<'c> {
    /// Begin a transaction, or join the one already active
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to start the transaction
    pub fn begin(connection: &'c Connection) -> Result<Self> {
        let owns_transaction = connection.transaction_begin()?;
        Ok(Self {
            connection,
            owns_transaction,
            finished: false,
        })
    }

    /// Whether this guard started the transaction it wraps
    pub fn owns_transaction(&self) -> bool {
        self.owns_transaction
    }

    pub fn connection(&self) -> &'c Connection {
        self.connection
    }

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; the guard is consumed either way
    /// and a failed commit is not retried on drop.
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        if self.owns_transaction {
            self.connection.transaction_commit()?;
        }
        Ok(())
    }

    /// Explicitly roll back the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        if self.owns_transaction {
            self.connection.transaction_rollback()?;
        }
        Ok(())
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if self.finished || !self.owns_transaction {
            return;
        }
        log::warn!("TransactionGuard dropped without commit or rollback; rolling back");
        if let Err(e) = self.connection.transaction_rollback() {
            log::error!("TransactionGuard auto-rollback failed: {}", e);
        }
    }
}
