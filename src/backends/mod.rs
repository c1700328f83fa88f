//! Database backend implementations
//!
//! This module contains concrete implementations of the [`Backend`] trait
//! for various database systems.
//!
//! [`Backend`]: crate::core::Backend

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
