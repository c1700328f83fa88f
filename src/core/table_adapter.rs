//! Per-entity-type query building and persistence
//!
//! A [`TableAdapter`] accumulates select/join/where/order/paging state for one
//! entity type, renders it through the query builders and executes it on a
//! [`Connection`]. Terminal operations clear the WHERE accumulator, so an
//! adapter is meant to be configured afresh for every statement.
//!
//! # Example
//!
//! ```
//! # #[cfg(feature = "sqlite")]
//! # fn main() -> rust_table_adapter::Result<()> {
//! use rust_table_adapter::prelude::*;
//!
//! let registry = MetadataRegistry::new();
//! registry.register_fn("Customer", |m| {
//!     m.register_entity(None, "Customer", false)
//!         .register_entity_field("CustomerId", DbType::Int, None, false, true, DatabaseValue::Long(0))
//!         .register_entity_field("Name", DbType::Varchar, Some(50), false, false, DatabaseValue::Null)
//!         .register_entity_pri_key("CustomerId");
//! });
//!
//! let conn = Connection::open(&ConnectionConfig::in_memory())?;
//! conn.execute_non_query(&Command::new(
//!     "CREATE TABLE Customer (CustomerId INTEGER PRIMARY KEY, Name TEXT NOT NULL)",
//! ))?;
//!
//! let mut customers = TableAdapter::new(&conn, &registry, "Customer")?;
//! let mut ann = registry.create("Customer")?;
//! ann.set("Name", "Ann")?;
//! customers.insert(&mut ann)?;
//!
//! let found = customers.filter("Name = 'Ann'")?.select_one()?;
//! assert_eq!(found.get("CustomerId")?, ann.get("CustomerId")?);
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "sqlite"))]
//! # fn main() {}
//! ```

use super::command::Command;
use super::database::Connection;
use super::database_types::ConcurrencyMode;
use super::entity::Entity;
use super::error::{DatabaseError, Result};
use super::metadata::{EntityMetadata, MetadataRegistry};
use super::predicate::{self, Aggregator, Clause, Operator};
use super::query_builder::{
    DeleteBuilder, InsertBuilder, Join, JoinType, OrderDirection, OrderTerm, SelectBuilder,
    SelectMember, TableRef, UpdateBuilder,
};
use super::transaction::TransactionGuard;
use super::type_map::DbType;
use super::value::{DatabaseRow, DatabaseValue};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// How `delete` removes a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// `DELETE` the row
    #[default]
    Physical,
    /// Flag the row as deleted; not supported
    Logical,
}

/// Query builder and persistence facade for one entity type
pub struct TableAdapter<'a> {
    connection: &'a Connection,
    registry: &'a MetadataRegistry,
    metadata: Arc<EntityMetadata>,
    members: Vec<SelectMember>,
    joins: Vec<Join>,
    clauses: Vec<Clause>,
    order_by: Vec<OrderTerm>,
    limit: Option<usize>,
    offset: Option<usize>,
    distinct: bool,
    excluded: HashSet<String>,
    deferred_execution: bool,
}

impl<'a> TableAdapter<'a> {
    /// Create an adapter for a registered entity type
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the type is not registered
    pub fn new(
        connection: &'a Connection,
        registry: &'a MetadataRegistry,
        entity_name: &str,
    ) -> Result<Self> {
        let metadata = registry.metadata(entity_name)?;
        Ok(Self {
            connection,
            registry,
            metadata,
            members: Vec::new(),
            joins: Vec::new(),
            clauses: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            excluded: HashSet::new(),
            deferred_execution: true,
        })
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    pub fn connection(&self) -> &'a Connection {
        self.connection
    }

    /// Add an explicit select-list entry
    ///
    /// Once any member is added the default all-fields list is not used.
    pub fn add_select_member(
        &mut self,
        member: &str,
        table: Option<&str>,
        alias: Option<&str>,
        is_aggregate: bool,
    ) -> &mut Self {
        self.members.push(SelectMember {
            member: member.to_string(),
            table: table.map(str::to_string),
            alias: alias.map(str::to_string),
            is_aggregate,
        });
        self
    }

    /// Leave a field out of the default select list
    pub fn exclude(&mut self, field_name: &str) -> &mut Self {
        self.excluded.insert(field_name.to_string());
        self
    }

    /// Whether binary fields are left out of the default select list
    pub fn deferred_execution(&mut self, enabled: bool) -> &mut Self {
        self.deferred_execution = enabled;
        self
    }

    /// Add a join; a join with the same table and alias is only added once
    pub fn join(
        &mut self,
        table: &str,
        on_condition: &str,
        join_type: JoinType,
        alias: Option<&str>,
    ) -> &mut Self {
        let alias = alias.map(str::to_string);
        if !self.joins.iter().any(|j| j.table == table && j.alias == alias) {
            self.joins.push(Join {
                join_type,
                table: table.to_string(),
                alias,
                on_condition: on_condition.to_string(),
            });
        }
        self
    }

    pub fn inner_join(&mut self, table: &str, on_condition: &str) -> &mut Self {
        self.join(table, on_condition, JoinType::Inner, None)
    }

    pub fn left_join(&mut self, table: &str, on_condition: &str) -> &mut Self {
        self.join(table, on_condition, JoinType::Left, None)
    }

    pub fn right_join(&mut self, table: &str, on_condition: &str) -> &mut Self {
        self.join(table, on_condition, JoinType::Right, None)
    }

    pub fn cross_join(&mut self, table: &str) -> &mut Self {
        self.join(table, "", JoinType::Cross, None)
    }

    /// Parse predicate text and append its clauses to the WHERE accumulator
    ///
    /// # Errors
    ///
    /// Returns `Parse` for malformed predicate text; the accumulator is left
    /// untouched in that case.
    pub fn filter(&mut self, predicate: &str) -> Result<&mut Self> {
        for clause in predicate::parse(predicate)? {
            self.add_clause(clause);
        }
        Ok(self)
    }

    /// Append a prebuilt clause; it is joined with AND unless it says otherwise
    pub fn add_clause(&mut self, mut clause: Clause) -> &mut Self {
        if self.clauses.is_empty() {
            clause.aggregator = None;
        } else if clause.aggregator.is_none() {
            clause.aggregator = Some(Aggregator::And);
        }
        self.clauses.push(clause);
        self
    }

    /// Clauses that the next terminal operation will apply
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn order_by(&mut self, terms: &str) -> &mut Self {
        self.order_by
            .extend(OrderTerm::parse_list(terms, OrderDirection::Asc));
        self
    }

    pub fn order_by_descending(&mut self, terms: &str) -> &mut Self {
        self.order_by
            .extend(OrderTerm::parse_list(terms, OrderDirection::Desc));
        self
    }

    /// Limit the number of rows returned
    pub fn take(&mut self, count: usize) -> &mut Self {
        self.limit = Some(count);
        self
    }

    /// Skip rows before returning any
    pub fn skip(&mut self, count: usize) -> &mut Self {
        self.offset = Some(count);
        self
    }

    pub fn distinct(&mut self) -> &mut Self {
        self.distinct = true;
        self
    }

    fn table_ref(&self) -> TableRef {
        TableRef::new(self.metadata.schema_name.as_deref(), &self.metadata.table_name)
    }

    fn column_types(&self) -> HashMap<String, DbType> {
        self.metadata
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.db_type))
            .collect()
    }

    fn default_members(&self) -> Vec<SelectMember> {
        self.metadata
            .fields
            .iter()
            .filter(|f| !self.excluded.contains(&f.name))
            .filter(|f| !(self.deferred_execution && f.db_type.is_binary()))
            .map(|f| SelectMember {
                member: f.name.clone(),
                table: Some(self.metadata.table_name.clone()),
                alias: None,
                is_aggregate: false,
            })
            .collect()
    }

    fn select_builder(&self) -> SelectBuilder {
        let members = if self.members.is_empty() {
            self.default_members()
        } else {
            self.members.clone()
        };
        let mut builder = SelectBuilder::new(self.table_ref())
            .members(members)
            .clauses(self.clauses.clone())
            .order_by(self.order_by.clone())
            .limit(self.limit)
            .offset(self.offset)
            .distinct(self.distinct)
            .column_types(self.column_types());
        for join in &self.joins {
            builder = builder.join(join.clone());
        }
        builder
    }

    /// Render the SELECT the current state describes, without executing it
    pub fn select_command(&self) -> Command {
        self.select_builder().build(self.connection.database_type())
    }

    fn clear_where(&mut self) {
        self.clauses.clear();
    }

    fn query(&mut self, command: Command) -> Result<Vec<DatabaseRow>> {
        self.clear_where();
        self.connection.execute_query(&command)
    }

    /// Build an entity from a row; fields missing from the row keep defaults
    /// and are marked unread
    fn materialize(&self, mut row: DatabaseRow) -> Entity {
        let mut entity = Entity::new(Arc::clone(&self.metadata));
        for field in entity.fields_mut() {
            match row.take(field.name()) {
                Some(value) => field.load(value),
                None => field.load_unread(),
            }
        }
        entity
    }

    /// Run the SELECT and materialize every row
    pub fn select(&mut self) -> Result<Vec<Entity>> {
        let command = self.select_command();
        let rows = self.query(command)?;
        Ok(rows.into_iter().map(|row| self.materialize(row)).collect())
    }

    /// First matching entity, or `None`
    pub fn select_one_or_default(&mut self) -> Result<Option<Entity>> {
        let command = self
            .select_builder()
            .limit(self.limit.or(Some(1)))
            .build(self.connection.database_type());
        let rows = self.query(command)?;
        Ok(rows.into_iter().next().map(|row| self.materialize(row)))
    }

    /// First matching entity
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` when no row matches
    pub fn select_one(&mut self) -> Result<Entity> {
        let entity_name = self.metadata.entity_name.clone();
        self.select_one_or_default()?.ok_or_else(|| {
            DatabaseError::key_not_found(format!("no matching '{}' row", entity_name))
        })
    }

    /// First column of the first row of the SELECT, Null if there is none
    pub fn select_scalar(&mut self) -> Result<DatabaseValue> {
        let command = self.select_command();
        let rows = self.query(command)?;
        Ok(rows
            .first()
            .and_then(|row| row.get_index(0))
            .cloned()
            .unwrap_or_default())
    }

    /// Evaluate an aggregate expression over the matching rows
    ///
    /// Select members, ordering and paging do not apply.
    pub fn aggregate(&mut self, expression: &str) -> Result<DatabaseValue> {
        let command = self
            .select_builder()
            .build_aggregate(self.connection.database_type(), expression);
        self.clear_where();
        self.connection.execute_scalar(&command)
    }

    /// Number of matching rows
    pub fn count(&mut self) -> Result<i64> {
        Ok(self.aggregate("COUNT(*)")?.as_long().unwrap_or(0))
    }

    fn add_identity_clauses(&mut self, identity: &[DatabaseValue]) -> Result<()> {
        let keys = self.metadata.primary_keys.clone();
        if keys.is_empty() {
            return Err(DatabaseError::invalid_operation(format!(
                "entity '{}' has no primary key",
                self.metadata.entity_name
            )));
        }
        if keys.len() != identity.len() {
            return Err(DatabaseError::invalid_parameter(format!(
                "entity '{}' has {} key field(s), got {} value(s)",
                self.metadata.entity_name,
                keys.len(),
                identity.len()
            )));
        }
        for (key, value) in keys.iter().zip(identity) {
            self.add_clause(Clause::compare(None, key, Operator::Eq, value.clone()));
        }
        Ok(())
    }

    /// The entity with the given primary-key values, in key order
    pub fn single(&mut self, identity: &[DatabaseValue]) -> Result<Entity> {
        self.add_identity_clauses(identity)?;
        self.select_one()
    }

    pub fn single_or_default(&mut self, identity: &[DatabaseValue]) -> Result<Option<Entity>> {
        self.add_identity_clauses(identity)?;
        self.select_one_or_default()
    }

    fn check_writable(&self, entity: &Entity) -> Result<()> {
        if entity.is_view() {
            return Err(DatabaseError::read_only(entity.entity_name()));
        }
        if entity.entity_name() != self.metadata.entity_name {
            return Err(DatabaseError::invalid_parameter(format!(
                "adapter for '{}' cannot persist a '{}' entity",
                self.metadata.entity_name,
                entity.entity_name()
            )));
        }
        Ok(())
    }

    /// Insert the entity; a single omitted key is filled from the backend
    pub fn insert(&mut self, entity: &mut Entity) -> Result<bool> {
        self.check_writable(entity)?;

        let mut builder = InsertBuilder::new(self.table_ref());
        let mut generated_key = None;
        for field in entity.fields() {
            let value = field.value();
            let is_key = self.metadata.is_primary_key(field.name());
            if is_key && value.is_zero_or_empty() {
                generated_key = Some(field.name().to_string());
                continue;
            }
            if value.is_empty() {
                continue;
            }
            builder = builder.value(field.name(), Some(field.db_type()), value.clone());
        }

        let command = builder.build(self.connection.database_type());
        self.clear_where();
        let affected = self.connection.execute_non_query(&command)?;

        if let (Some(key), 1) = (generated_key, self.metadata.primary_keys.len()) {
            let id = self.connection.last_insert_id()?;
            entity.set(&key, id)?;
        }
        entity.accept_changes();
        Ok(affected > 0)
    }

    /// Columns and values that identify the entity's row for UPDATE/DELETE
    fn row_match(&self, entity: &Entity) -> Result<Vec<(String, DbType, DatabaseValue)>> {
        let mode = self.connection.concurrency_mode();
        if mode == ConcurrencyMode::LastInWins && self.metadata.primary_keys.is_empty() {
            return Err(DatabaseError::invalid_operation(format!(
                "entity '{}' has no primary key",
                self.metadata.entity_name
            )));
        }

        let mut matches = Vec::new();
        for field in entity.fields() {
            let is_key = self.metadata.is_primary_key(field.name());
            let value = match mode {
                ConcurrencyMode::LastInWins if is_key => field.value().clone(),
                ConcurrencyMode::LastInWins => continue,
                ConcurrencyMode::FirstInWins if is_key => field.value().clone(),
                // binary and unread fields have no comparable original value
                ConcurrencyMode::FirstInWins => match field.initial_value() {
                    Some(original) => original.clone(),
                    None => continue,
                },
            };
            matches.push((field.name().to_string(), field.db_type(), value));
        }
        Ok(matches)
    }

    /// Write changed fields back
    ///
    /// Returns `false` when no row matched, which under first-in-wins means
    /// another writer changed the row since it was read.
    pub fn update(&mut self, entity: &mut Entity) -> Result<bool> {
        self.check_writable(entity)?;
        if !entity.has_changed() {
            return Ok(true);
        }

        let mut builder = UpdateBuilder::new(self.table_ref());
        for field in entity.fields().filter(|f| f.has_changed()) {
            if self.metadata.is_primary_key(field.name()) {
                continue;
            }
            builder = builder.set(field.name(), Some(field.db_type()), field.value().clone());
        }
        if !builder.has_assignments() {
            return Err(DatabaseError::invalid_operation(format!(
                "only key fields of '{}' changed; keys cannot be updated",
                self.metadata.entity_name
            )));
        }
        for (column, db_type, value) in self.row_match(entity)? {
            builder = builder.matching(&column, Some(db_type), value);
        }

        let command = builder.build(self.connection.database_type());
        self.clear_where();
        let affected = self.connection.execute_non_query(&command)?;
        if affected > 0 {
            entity.accept_changes();
        }
        Ok(affected > 0)
    }

    /// Delete the entity's row
    ///
    /// # Errors
    ///
    /// `DeleteMode::Logical` always fails with `InvalidOperation`.
    pub fn delete(&mut self, entity: &Entity, mode: DeleteMode) -> Result<bool> {
        self.check_writable(entity)?;
        if mode == DeleteMode::Logical {
            return Err(DatabaseError::invalid_operation(
                "logical delete is not implemented",
            ));
        }

        let mut builder = DeleteBuilder::new(self.table_ref());
        for (column, db_type, value) in self.row_match(entity)? {
            builder = builder.matching(&column, Some(db_type), value);
        }
        let command = builder.build(self.connection.database_type());
        self.clear_where();
        Ok(self.connection.execute_non_query(&command)? > 0)
    }

    /// Run `op` over every item, optionally inside one transaction
    ///
    /// Failures are logged and reported as `false`; the transaction, if
    /// requested, is rolled back.
    fn run_batch<T: Clone>(
        &mut self,
        items: &mut [T],
        use_transaction: bool,
        what: &str,
        mut op: impl FnMut(&mut Self, &mut T) -> Result<bool>,
    ) -> bool {
        let guard = if use_transaction {
            match TransactionGuard::begin(self.connection) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    log::warn!("{}: could not begin transaction: {}", what, e);
                    return false;
                }
            }
        } else {
            None
        };

        // rolled-back items must not keep state from writes that were undone
        let snapshot: Vec<T> = if guard.is_some() { items.to_vec() } else { Vec::new() };

        for index in 0..items.len() {
            if let Err(e) = op(self, &mut items[index]) {
                log::warn!("{} failed at item {}: {}", what, index, e);
                if let Some(guard) = guard {
                    if let Err(e) = guard.rollback() {
                        log::error!("{}: rollback failed: {}", what, e);
                    }
                    items[..=index].clone_from_slice(&snapshot[..=index]);
                }
                return false;
            }
        }

        if let Some(guard) = guard {
            if let Err(e) = guard.commit() {
                log::warn!("{}: commit failed: {}", what, e);
                items.clone_from_slice(&snapshot);
                return false;
            }
        }
        true
    }

    /// Insert every entity; `false` if any insert failed
    pub fn insert_all(&mut self, entities: &mut [Entity], use_transaction: bool) -> bool {
        self.run_batch(entities, use_transaction, "insert_all", |adapter, entity| {
            adapter.insert(entity)
        })
    }

    /// Delete every entity; `false` if any delete failed
    pub fn delete_all(&mut self, entities: &mut [Entity], use_transaction: bool) -> bool {
        self.run_batch(entities, use_transaction, "delete_all", |adapter, entity| {
            adapter.delete(entity, DeleteMode::Physical)
        })
    }

    fn related(&self, entity: &Entity, target: &str, parent: bool) -> Result<Option<TableAdapter<'a>>> {
        let relation = entity.relation(target)?;
        if relation.is_parent_relation != parent {
            return Err(DatabaseError::invalid_operation(format!(
                "relation from '{}' to '{}' is not a {} relation",
                entity.entity_name(),
                target,
                if parent { "parent" } else { "child" }
            )));
        }
        let value = entity.get(&relation.local_field_name)?;
        if value.is_null() {
            return Ok(None);
        }

        let mut adapter = TableAdapter::new(self.connection, self.registry, target)?;
        adapter.add_clause(Clause::compare(
            None,
            &relation.foreign_field_name,
            Operator::Eq,
            value.clone(),
        ));
        Ok(Some(adapter))
    }

    /// The parent entity a many-to-one relation points at
    pub fn select_parent(&self, entity: &Entity, target: &str) -> Result<Option<Entity>> {
        match self.related(entity, target, true)? {
            Some(mut adapter) => adapter.select_one_or_default(),
            None => Ok(None),
        }
    }

    /// The dependent entities of a one-to-many relation
    pub fn select_children(&self, entity: &Entity, target: &str) -> Result<Vec<Entity>> {
        match self.related(entity, target, false)? {
            Some(mut adapter) => adapter.select(),
            None => Ok(Vec::new()),
        }
    }
}

impl std::fmt::Debug for TableAdapter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableAdapter")
            .field("entity", &self.metadata.entity_name)
            .field("clauses", &self.clauses.len())
            .field("joins", &self.joins.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::tests::{recording_connection, Journal, RecordingBackend};
    use crate::core::database::ConnectionConfig;
    use parking_lot::Mutex;

    fn registry() -> MetadataRegistry {
        let registry = MetadataRegistry::new();
        registry.register_fn("Customer", |m| {
            m.register_entity(None, "Customer", false)
                .register_entity_field("CustomerId", DbType::Int, None, false, true, DatabaseValue::Long(0))
                .register_entity_field("Name", DbType::Varchar, Some(50), false, false, DatabaseValue::Null)
                .register_entity_field("Age", DbType::Int, None, true, false, DatabaseValue::Null)
                .register_binary_entity_field("Photo", true)
                .register_entity_pri_key("CustomerId")
                .register_entity_relation("Order", "CustomerId", "CustomerId", false);
        });
        registry.register_fn("CustomerView", |m| {
            m.register_entity(None, "CustomerView", true)
                .register_entity_field("Name", DbType::Varchar, None, true, false, DatabaseValue::Null);
        });
        registry
    }

    fn loaded_customer(adapter: &TableAdapter<'_>, id: i64, name: &str, age: i64) -> Entity {
        let mut row = DatabaseRow::new();
        row.insert("CustomerId", DatabaseValue::Long(id));
        row.insert("Name", DatabaseValue::from(name));
        row.insert("Age", DatabaseValue::Long(age));
        adapter.materialize(row)
    }

    #[test]
    fn test_customer_select_rendering() {
        let (conn, _) = recording_connection();
        let registry = registry();
        let mut adapter = TableAdapter::new(&conn, &registry, "Customer").unwrap();
        adapter
            .filter("Name = 'Ann' AND Age > 30")
            .unwrap()
            .order_by_descending("Age")
            .take(5);

        let command = adapter.select_command();
        assert_eq!(
            command.text(),
            "SELECT \"Customer\".\"CustomerId\", \"Customer\".\"Name\", \"Customer\".\"Age\" \
             FROM \"Customer\" WHERE \"Customer\".\"Name\" = ? AND \"Customer\".\"Age\" > ? \
             ORDER BY \"Customer\".\"Age\" DESC LIMIT 5"
        );
        assert_eq!(
            command.values(),
            vec![DatabaseValue::from("Ann"), DatabaseValue::Long(30)]
        );
        assert_eq!(command.parameters()[1].db_type, Some(DbType::Int));
    }

    #[test]
    fn test_deferred_execution_and_exclusion() {
        let (conn, _) = recording_connection();
        let registry = registry();
        let mut adapter = TableAdapter::new(&conn, &registry, "Customer").unwrap();
        adapter.deferred_execution(false).exclude("Age");
        let text = adapter.select_command().text().to_string();
        assert!(text.contains("\"Photo\""));
        assert!(!text.contains("\"Age\""));
    }

    #[test]
    fn test_duplicate_join_renders_once() {
        let (conn, _) = recording_connection();
        let registry = registry();
        let mut adapter = TableAdapter::new(&conn, &registry, "Customer").unwrap();
        adapter
            .join("Orders", "Orders.CustomerId = Customer.CustomerId", JoinType::Inner, None)
            .join("Orders", "Orders.CustomerId = Customer.CustomerId", JoinType::Inner, None)
            .join("Orders", "o.CustomerId = Customer.CustomerId", JoinType::Left, Some("o"));
        let text = adapter.select_command().text().to_string();
        assert_eq!(text.matches("INNER JOIN").count(), 1);
        assert_eq!(text.matches("LEFT JOIN").count(), 1);
    }

    #[test]
    fn test_terminal_operation_clears_where() {
        let (conn, journal) = recording_connection();
        conn.connect().unwrap();
        let registry = registry();
        let mut adapter = TableAdapter::new(&conn, &registry, "Customer").unwrap();
        adapter.filter("Age > 3").unwrap().order_by("Name");
        adapter.select().unwrap();
        assert!(adapter.clauses().is_empty());

        adapter.select().unwrap();
        let statements = journal.lock().statements.clone();
        assert!(statements[1].contains("WHERE"));
        assert!(!statements[2].contains("WHERE"));
        assert!(statements[2].contains("ORDER BY"));
    }

    #[test]
    fn test_aggregate_ignores_members_and_order() {
        let (conn, journal) = recording_connection();
        conn.connect().unwrap();
        let registry = registry();
        let mut adapter = TableAdapter::new(&conn, &registry, "Customer").unwrap();
        adapter
            .add_select_member("Name", None, None, false)
            .order_by("Name")
            .take(1)
            .filter("Age >= 18")
            .unwrap();
        assert_eq!(adapter.count().unwrap(), 0);
        assert_eq!(
            journal.lock().statements[1],
            "SELECT COUNT(*) FROM \"Customer\" WHERE \"Customer\".\"Age\" >= ?"
        );
    }

    #[test]
    fn test_view_rejects_writes_before_sql() {
        let (conn, journal) = recording_connection();
        conn.connect().unwrap();
        let registry = registry();
        let mut adapter = TableAdapter::new(&conn, &registry, "CustomerView").unwrap();
        let mut entity = registry.create("CustomerView").unwrap();
        entity.set("Name", "x").unwrap();

        assert!(matches!(adapter.insert(&mut entity), Err(DatabaseError::ReadOnlyEntity(_))));
        assert!(matches!(adapter.update(&mut entity), Err(DatabaseError::ReadOnlyEntity(_))));
        assert!(matches!(
            adapter.delete(&entity, DeleteMode::Physical),
            Err(DatabaseError::ReadOnlyEntity(_))
        ));
        assert_eq!(journal.lock().statements, vec!["CONNECT"]);
    }

    #[test]
    fn test_insert_skips_empty_values_and_assigns_key() {
        let (conn, journal) = recording_connection();
        conn.connect().unwrap();
        journal.lock().affected = 1;
        let registry = registry();
        let mut adapter = TableAdapter::new(&conn, &registry, "Customer").unwrap();

        let mut entity = registry.create("Customer").unwrap();
        entity.set("Name", "Ann").unwrap();
        assert!(adapter.insert(&mut entity).unwrap());

        assert_eq!(
            journal.lock().statements[1],
            "INSERT INTO \"Customer\" (\"Name\") VALUES (?)"
        );
        assert_eq!(entity.get("CustomerId").unwrap(), &DatabaseValue::Long(7));
        assert!(!entity.has_changed());
    }

    #[test]
    fn test_update_last_in_wins_matches_keys() {
        let (conn, journal) = recording_connection();
        conn.connect().unwrap();
        journal.lock().affected = 1;
        let registry = registry();
        let mut adapter = TableAdapter::new(&conn, &registry, "Customer").unwrap();

        let mut entity = loaded_customer(&adapter, 1, "Ann", 30);
        assert!(adapter.update(&mut entity).unwrap());
        // nothing changed, nothing sent
        assert_eq!(journal.lock().statements.len(), 1);

        entity.set("Age", 31).unwrap();
        assert!(adapter.update(&mut entity).unwrap());
        assert_eq!(
            journal.lock().statements[1],
            "UPDATE \"Customer\" SET \"Age\" = ? WHERE \"CustomerId\" = ?"
        );
        assert!(!entity.has_changed());
    }

    #[test]
    fn test_update_first_in_wins_lost_race() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let backend = RecordingBackend::new(Arc::clone(&journal));
        let conn = Connection::new(
            Box::new(backend),
            ConnectionConfig::default().concurrency_mode(ConcurrencyMode::FirstInWins),
        );
        conn.connect().unwrap();
        let registry = registry();
        let mut adapter = TableAdapter::new(&conn, &registry, "Customer").unwrap();

        let mut entity = loaded_customer(&adapter, 1, "Ann", 30);
        entity.set("Age", 31).unwrap();
        assert!(!adapter.update(&mut entity).unwrap());
        assert!(entity.has_changed());

        assert_eq!(
            journal.lock().statements[1],
            "UPDATE \"Customer\" SET \"Age\" = ? \
             WHERE \"CustomerId\" = ? AND \"Name\" = ? AND \"Age\" = ?"
        );
    }

    #[test]
    fn test_logical_delete_not_implemented() {
        let (conn, _) = recording_connection();
        conn.connect().unwrap();
        let registry = registry();
        let mut adapter = TableAdapter::new(&conn, &registry, "Customer").unwrap();
        let entity = loaded_customer(&adapter, 1, "Ann", 30);
        assert!(matches!(
            adapter.delete(&entity, DeleteMode::Logical),
            Err(DatabaseError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_single_key_count_mismatch() {
        let (conn, _) = recording_connection();
        conn.connect().unwrap();
        let registry = registry();
        let mut adapter = TableAdapter::new(&conn, &registry, "Customer").unwrap();
        assert!(matches!(
            adapter.single(&[1.into(), 2.into()]),
            Err(DatabaseError::InvalidParameter(_))
        ));
        assert!(matches!(
            adapter.single(&[1.into()]),
            Err(DatabaseError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_materialize_starts_unchanged() {
        let (conn, _) = recording_connection();
        let registry = registry();
        let adapter = TableAdapter::new(&conn, &registry, "Customer").unwrap();
        let mut row = DatabaseRow::new();
        row.insert("CustomerId", DatabaseValue::Long(4));
        row.insert("name", DatabaseValue::from("Bo"));
        row.insert("Photo", DatabaseValue::Bytes(vec![1, 2, 3]));
        let mut entity = adapter.materialize(row);

        assert_eq!(entity.get("Name").unwrap().as_str(), Some("Bo"));
        assert!(entity.get("Age").unwrap().is_null());
        assert!(!entity.has_changed());
        let photo = entity.stream_mut("Photo").unwrap().unwrap();
        assert_eq!(photo.read_all().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_relation_direction_checked() {
        let (conn, _) = recording_connection();
        conn.connect().unwrap();
        let registry = registry();
        let adapter = TableAdapter::new(&conn, &registry, "Customer").unwrap();
        let entity = loaded_customer(&adapter, 1, "Ann", 30);
        assert!(matches!(
            adapter.select_parent(&entity, "Order"),
            Err(DatabaseError::InvalidOperation(_))
        ));
        assert!(matches!(
            adapter.select_children(&entity, "Invoice"),
            Err(DatabaseError::KeyNotFound(_))
        ));
    }
}
