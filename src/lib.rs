//! # Rust Table Adapter
//!
//! A lightweight object-relational data-access layer. Per-entity query state
//! (selected columns, joins, predicates, ordering, paging, aggregation) and a
//! small textual predicate language are rendered into backend-specific,
//! parameterized SQL, executed through a pluggable connection abstraction,
//! and materialized back into change-tracked entities.
//!
//! ## Features
//!
//! - **Predicate language**: `"Name = 'Ann' AND Age BETWEEN 18 AND 65"` parsed
//!   by an explicit state machine into typed clauses
//! - **Table adapters**: fluent `filter`/`join`/`order_by`/`take`/`skip` state
//!   rendered to SELECT/INSERT/UPDATE/DELETE with consistent quoting and
//!   placeholder order
//! - **Change tracking**: entities remember their loaded values; updates send
//!   only what changed
//! - **Concurrency modes**: last-in-wins (match on keys) or first-in-wins
//!   (match on original values, lost races report `false`)
//! - **Metadata registry**: lazily loaded, immutable per-type schema facts
//! - **Synchronous**: every call runs on the caller's thread
//!
//! ## Supported Databases
//!
//! | Database | Status | Notes |
//! |----------|--------|-------|
//! | SQLite | Implemented | Bundled, with schema introspection |
//! | PostgreSQL, MySQL, Oracle, SQL Server | Dialect only | Quoting, placeholders and paging render; bring a [`Backend`] |
//!
//! ## Quick Start
//!
//! ```rust
//! # #[cfg(feature = "sqlite")]
//! # fn main() -> rust_table_adapter::Result<()> {
//! use rust_table_adapter::prelude::*;
//!
//! let registry = MetadataRegistry::new();
//! registry.register_fn("Customer", |m| {
//!     m.register_entity(None, "Customer", false)
//!         .register_entity_field("CustomerId", DbType::Int, None, false, true, DatabaseValue::Long(0))
//!         .register_entity_field("Name", DbType::Varchar, Some(50), false, false, DatabaseValue::Null)
//!         .register_entity_field("Age", DbType::Int, None, true, false, DatabaseValue::Null)
//!         .register_entity_pri_key("CustomerId");
//! });
//!
//! let conn = Connection::open(&ConnectionConfig::in_memory())?;
//! conn.execute_non_query(&Command::new(
//!     "CREATE TABLE Customer (CustomerId INTEGER PRIMARY KEY, Name TEXT, Age INTEGER)",
//! ))?;
//!
//! let mut customers = TableAdapter::new(&conn, &registry, "Customer")?;
//! for (name, age) in [("Ann", 34), ("Bob", 25)] {
//!     let mut customer = registry.create("Customer")?;
//!     customer.set("Name", name)?;
//!     customer.set("Age", age)?;
//!     customers.insert(&mut customer)?;
//! }
//!
//! let older = customers
//!     .filter("Age > 30")?
//!     .order_by_descending("Age")
//!     .take(5)
//!     .select()?;
//! assert_eq!(older.len(), 1);
//! assert_eq!(older[0].get("Name")?.as_str(), Some("Ann"));
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "sqlite"))]
//! # fn main() {}
//! ```
//!
//! ## Project Structure
//!
//! ```text
//! rust_table_adapter/
//! ├── src/
//! │   ├── core/                 # Core types and traits
//! │   │   ├── predicate.rs      # Predicate tokenizer and parser
//! │   │   ├── query_builder.rs  # SQL rendering
//! │   │   ├── table_adapter.rs  # Query building and persistence facade
//! │   │   ├── database.rs       # Backend trait, Connection, configuration
//! │   │   ├── transaction.rs    # RAII transaction guard
//! │   │   ├── entity.rs         # Change-tracked entities
//! │   │   ├── metadata.rs       # Metadata registry
//! │   │   └── ...
//! │   ├── backends/             # Backend implementations
//! │   │   └── sqlite.rs
//! │   └── lib.rs
//! ├── demos/                    # Example programs
//! ├── tests/                    # Integration and property tests
//! └── benches/
//! ```

/// Core data-access types and traits
pub mod core;

/// Database backend implementations
pub mod backends;

/// Prelude for convenient imports
///
/// ```rust
/// use rust_table_adapter::prelude::*;
///
/// let clauses = predicate::parse("a = 1 AND b = 2").unwrap();
/// assert_eq!(clauses.len(), 2);
/// ```
pub mod prelude {
    pub use crate::core::predicate;
    pub use crate::core::{
        Backend, Command, ConcurrencyMode, Connection, ConnectionConfig, ConnectionFactory,
        DatabaseError, DatabaseResult, DatabaseRow, DatabaseType, DatabaseValue, DbType,
        DeleteMode, Entity, EntityDescriptor, JoinType, MetadataBuilder, MetadataRegistry,
        Parameter, Result, TableAdapter, TransactionGuard,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::backends::SqliteBackend;
}

// Re-export at root level for convenience
pub use crate::core::{
    Backend, BinaryStream, Command, ConcurrencyMode, Connection, ConnectionConfig,
    ConnectionFactory, ConnectionState, DatabaseError, DatabaseResult, DatabaseRow, DatabaseType,
    DatabaseValue, DbType, DeleteMode, Entity, EntityDescriptor, EntityField, EntityMetadata,
    EntityRelation, JoinType, MetadataBuilder, MetadataRegistry, Parameter, Result,
    SchemaIntrospection, TableAdapter, TransactionGuard,
};

#[cfg(feature = "sqlite")]
pub use backends::SqliteBackend;
