//! Core data-access types and traits
//!
//! This module provides the fundamental building blocks: error and value
//! types, the predicate parser, SQL rendering, the connection abstraction,
//! entity metadata and change tracking, and the table adapter tying them
//! together.

pub mod binary;
pub mod command;
pub mod database;
pub mod database_types;
pub mod entity;
pub mod error;
pub mod metadata;
pub mod predicate;
pub mod query_builder;
pub mod table_adapter;
pub mod transaction;
pub mod type_map;
pub mod value;

// Re-export commonly used types
pub use binary::{BinaryStream, StreamState};
pub use command::{Command, Parameter};
pub use database::{
    Backend, ColumnInfo, Connection, ConnectionConfig, ConnectionFactory, ConnectionState,
    ForeignKeyInfo, SchemaIntrospection,
};
pub use database_types::{ConcurrencyMode, DatabaseType};
pub use entity::{Entity, EntityField};
pub use error::{DatabaseError, Result};
pub use metadata::{
    EntityDescriptor, EntityMetadata, EntityRelation, FieldDefinition, MetadataBuilder,
    MetadataRegistry,
};
pub use predicate::{Aggregator, Clause, ClauseOperator, ClauseValue, Operator, RangeOperator};
pub use query_builder::{
    DeleteBuilder, InsertBuilder, Join, JoinType, OrderDirection, OrderTerm, SelectBuilder,
    SelectMember, TableRef, UpdateBuilder,
};
pub use table_adapter::{DeleteMode, TableAdapter};
pub use transaction::TransactionGuard;
pub use type_map::{DbType, ParamType, TypeMap};
pub use value::{DatabaseResult, DatabaseRow, DatabaseValue};
