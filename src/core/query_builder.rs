//! SQL rendering
//!
//! Builders for SELECT/INSERT/UPDATE/DELETE that render to a [`Command`] in a
//! given dialect. All four share one [`SqlWriter`] so identifier quoting and
//! placeholder numbering agree across statement kinds.

use super::command::{Command, Parameter};
use super::database_types::DatabaseType;
use super::predicate::{Clause, ClauseOperator, ClauseValue, Operator, RangeOperator};
use super::type_map::DbType;
use super::value::DatabaseValue;
use std::collections::HashMap;

/// JOIN types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinType {
    fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Cross => "CROSS JOIN",
        }
    }
}

/// JOIN clause; the ON condition is emitted verbatim
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: String,
    pub alias: Option<String>,
    pub on_condition: String,
}

/// ORDER BY direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// One ORDER BY term
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub expression: String,
    pub direction: OrderDirection,
}

impl OrderTerm {
    /// Split comma-separated order text into terms
    ///
    /// A trailing `ASC`/`DESC` on a term overrides `direction`.
    pub fn parse_list(text: &str, direction: OrderDirection) -> Vec<OrderTerm> {
        text.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|term| {
                let (expression, direction) = match term.rsplit_once(char::is_whitespace) {
                    Some((head, last)) if last.eq_ignore_ascii_case("DESC") => {
                        (head.trim_end(), OrderDirection::Desc)
                    }
                    Some((head, last)) if last.eq_ignore_ascii_case("ASC") => {
                        (head.trim_end(), OrderDirection::Asc)
                    }
                    _ => (term, direction),
                };
                OrderTerm {
                    expression: expression.to_string(),
                    direction,
                }
            })
            .collect()
    }
}

/// One SELECT list entry
#[derive(Debug, Clone, PartialEq)]
pub struct SelectMember {
    pub member: String,
    pub table: Option<String>,
    pub alias: Option<String>,
    pub is_aggregate: bool,
}

/// Schema-qualified table name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: Option<&str>, name: &str) -> Self {
        Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        }
    }
}

/// A column match used by UPDATE/DELETE; a Null value renders `IS NULL`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub db_type: Option<DbType>,
    pub value: DatabaseValue,
}

/// Expressions are passed through verbatim instead of being quoted
fn is_expression(text: &str) -> bool {
    text.contains(['(', '*', ' '])
}

/// Accumulates SQL text and parameters for one statement
#[derive(Debug)]
pub struct SqlWriter {
    dialect: DatabaseType,
    sql: String,
    parameters: Vec<Parameter>,
}

impl SqlWriter {
    pub fn new(dialect: DatabaseType) -> Self {
        Self {
            dialect,
            sql: String::new(),
            parameters: Vec::new(),
        }
    }

    pub fn push(&mut self, text: &str) -> &mut Self {
        self.sql.push_str(text);
        self
    }

    /// Append a placeholder and record its parameter
    pub fn bind(&mut self, name: &str, db_type: Option<DbType>, value: DatabaseValue) -> &mut Self {
        let placeholder = self.dialect.placeholder(self.parameters.len());
        self.sql.push_str(&placeholder);
        self.parameters.push(Parameter::new(name, db_type, value));
        self
    }

    pub fn quote(&self, identifier: &str) -> String {
        self.dialect.quote_identifier(identifier)
    }

    pub fn table(&self, table: &TableRef) -> String {
        match &table.schema {
            Some(schema) => format!("{}.{}", self.quote(schema), self.quote(&table.name)),
            None => self.quote(&table.name),
        }
    }

    /// `table.column`, quoted; expressions pass through unchanged
    pub fn column(&self, table: Option<&str>, column: &str) -> String {
        if is_expression(column) {
            return column.to_string();
        }
        match table {
            Some(table) => format!("{}.{}", self.quote(table), self.quote(column)),
            None => self.quote(column),
        }
    }

    /// Render one predicate clause; bare identifiers are qualified with
    /// `default_table`
    pub fn clause(
        &mut self,
        clause: &Clause,
        default_table: Option<&str>,
        types: &HashMap<String, DbType>,
    ) -> &mut Self {
        if let Some(aggregator) = clause.aggregator {
            self.push(" ").push(aggregator.as_sql()).push(" ");
        }

        let target = if clause.is_function_call() {
            clause.identifier.clone()
        } else {
            self.column(clause.table.as_deref().or(default_table), &clause.identifier)
        };
        // parameter types are only known for our own columns
        let own = clause.table.is_none() || clause.table.as_deref() == default_table;
        let db_type = own.then(|| types.get(&clause.identifier).copied()).flatten();

        self.push(&target);
        match (&clause.operator, &clause.value) {
            (ClauseOperator::Comparison(op), ClauseValue::Scalar(value)) => {
                self.comparison(*op, &clause.identifier, db_type, value)
            }
            (ClauseOperator::Range(RangeOperator::Between), ClauseValue::List(values)) => {
                self.push(" BETWEEN ");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.push(" AND ");
                    }
                    self.bind(&clause.identifier, db_type, value.clone());
                }
                self
            }
            (ClauseOperator::Range(RangeOperator::In), ClauseValue::List(values)) => {
                self.push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.bind(&clause.identifier, db_type, value.clone());
                }
                self.push(")")
            }
            // mismatched shapes are only constructible by hand; render the
            // first value so the statement still fails loudly at the backend
            (ClauseOperator::Range(op), ClauseValue::Scalar(value)) => {
                self.push(" ").push(op.as_sql()).push(" (");
                self.bind(&clause.identifier, db_type, value.clone());
                self.push(")")
            }
            (ClauseOperator::Comparison(op), ClauseValue::List(values)) => {
                let value = values.first().cloned().unwrap_or_default();
                self.comparison(*op, &clause.identifier, db_type, &value)
            }
        }
    }

    fn comparison(
        &mut self,
        op: Operator,
        name: &str,
        db_type: Option<DbType>,
        value: &DatabaseValue,
    ) -> &mut Self {
        match (op, value) {
            (Operator::Eq | Operator::Is, DatabaseValue::Null) => self.push(" IS NULL"),
            (Operator::Ne | Operator::IsNot, DatabaseValue::Null) => self.push(" IS NOT NULL"),
            (_, DatabaseValue::Null) => self.push(" ").push(op.as_sql()).push(" NULL"),
            (Operator::Is | Operator::IsNot, DatabaseValue::Bool(b)) => self
                .push(" ")
                .push(op.as_sql())
                .push(if *b { " TRUE" } else { " FALSE" }),
            _ => {
                self.push(" ").push(op.as_sql()).push(" ");
                self.bind(name, db_type, value.clone())
            }
        }
    }

    /// Render `col = ? AND col2 IS NULL ...` for UPDATE/DELETE matching
    pub fn conditions(&mut self, conditions: &[Condition]) -> &mut Self {
        for (i, condition) in conditions.iter().enumerate() {
            if i > 0 {
                self.push(" AND ");
            }
            let column = self.quote(&condition.column);
            self.push(&column);
            if condition.value.is_null() {
                self.push(" IS NULL");
            } else {
                self.push(" = ");
                self.bind(&condition.column, condition.db_type, condition.value.clone());
            }
        }
        self
    }

    pub fn finish(self) -> Command {
        Command::with_parameters(self.sql, self.parameters)
    }
}

/// SELECT query builder
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    table: TableRef,
    members: Vec<SelectMember>,
    joins: Vec<Join>,
    clauses: Vec<Clause>,
    order_by: Vec<OrderTerm>,
    limit: Option<usize>,
    offset: Option<usize>,
    distinct: bool,
    column_types: HashMap<String, DbType>,
}

impl SelectBuilder {
    /// Create a new SELECT query builder
    ///
    /// # Example
    ///
    /// ```
    /// use rust_table_adapter::core::query_builder::{SelectBuilder, TableRef};
    /// use rust_table_adapter::DatabaseType;
    ///
    /// let command = SelectBuilder::new(TableRef::new(None, "users"))
    ///     .member("id", None, None, false)
    ///     .build(DatabaseType::Sqlite);
    /// assert_eq!(command.text(), "SELECT \"users\".\"id\" FROM \"users\"");
    /// ```
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            members: Vec::new(),
            joins: Vec::new(),
            clauses: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            column_types: HashMap::new(),
        }
    }

    /// Domain types of the table's columns, used to type WHERE parameters
    #[must_use]
    pub fn column_types(mut self, types: HashMap<String, DbType>) -> Self {
        self.column_types = types;
        self
    }

    #[must_use]
    pub fn member(mut self, member: &str, table: Option<&str>, alias: Option<&str>, is_aggregate: bool) -> Self {
        self.members.push(SelectMember {
            member: member.to_string(),
            table: table.map(str::to_string),
            alias: alias.map(str::to_string),
            is_aggregate,
        });
        self
    }

    #[must_use]
    pub fn members(mut self, members: Vec<SelectMember>) -> Self {
        self.members = members;
        self
    }

    /// Add a JOIN; a second join with the same table and alias is ignored
    #[must_use]
    pub fn join(mut self, join: Join) -> Self {
        let duplicate = self
            .joins
            .iter()
            .any(|j| j.table == join.table && j.alias == join.alias);
        if !duplicate {
            self.joins.push(join);
        }
        self
    }

    #[must_use]
    pub fn clauses(mut self, clauses: Vec<Clause>) -> Self {
        self.clauses = clauses;
        self
    }

    #[must_use]
    pub fn order_by(mut self, terms: Vec<OrderTerm>) -> Self {
        self.order_by = terms;
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: Option<usize>) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    fn render_member(&self, writer: &SqlWriter, member: &SelectMember) -> String {
        let table = member.table.as_deref().unwrap_or(&self.table.name);
        writer.column(Some(table), &member.member)
    }

    fn write_from(&self, writer: &mut SqlWriter) {
        let table = writer.table(&self.table);
        writer.push(" FROM ").push(&table);

        for join in &self.joins {
            let mut target = writer.quote(&join.table);
            if let Some(alias) = &join.alias {
                target = format!("{} {}", target, writer.quote(alias));
            }
            writer.push(" ").push(join.join_type.as_sql()).push(" ").push(&target);
            if join.join_type != JoinType::Cross && !join.on_condition.trim().is_empty() {
                writer.push(" ON ").push(&join.on_condition);
            }
        }

        if !self.clauses.is_empty() {
            writer.push(" WHERE ");
            for clause in &self.clauses {
                writer.clause(clause, Some(&self.table.name), &self.column_types);
            }
        }
    }

    fn render_order_term(&self, writer: &SqlWriter, term: &OrderTerm) -> String {
        let expression = &term.expression;
        let target = if is_expression(expression) {
            expression.clone()
        } else if let Some((table, column)) = expression.split_once('.') {
            writer.column(Some(table), column)
        } else if self.members.iter().any(|m| m.alias.as_deref() == Some(expression)) {
            writer.quote(expression)
        } else {
            writer.column(Some(&self.table.name), expression)
        };
        format!("{} {}", target, term.direction.as_sql())
    }

    /// Build the SELECT command
    pub fn build(&self, dialect: DatabaseType) -> Command {
        let mut writer = SqlWriter::new(dialect);
        writer.push("SELECT ");
        if self.distinct {
            writer.push("DISTINCT ");
        }

        let list: Vec<String> = if self.members.is_empty() {
            vec!["*".to_string()]
        } else {
            self.members
                .iter()
                .map(|m| {
                    let rendered = self.render_member(&writer, m);
                    match &m.alias {
                        Some(alias) => format!("{} AS {}", rendered, writer.quote(alias)),
                        None => rendered,
                    }
                })
                .collect()
        };
        writer.push(&list.join(", "));

        self.write_from(&mut writer);

        if self.members.iter().any(|m| m.is_aggregate) {
            let groups: Vec<String> = self
                .members
                .iter()
                .filter(|m| !m.is_aggregate)
                .map(|m| self.render_member(&writer, m))
                .collect();
            if !groups.is_empty() {
                writer.push(" GROUP BY ").push(&groups.join(", "));
            }
        }

        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|t| self.render_order_term(&writer, t))
                .collect();
            writer.push(" ORDER BY ").push(&terms.join(", "));
        }

        writer.push(&dialect.limit_clause(self.limit, self.offset));
        writer.finish()
    }

    /// Build `SELECT <expression> FROM ... WHERE ...`, ignoring the select
    /// list, grouping, ordering and paging
    pub fn build_aggregate(&self, dialect: DatabaseType, expression: &str) -> Command {
        let mut writer = SqlWriter::new(dialect);
        writer.push("SELECT ").push(expression);
        self.write_from(&mut writer);
        writer.finish()
    }
}

/// INSERT query builder
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    table: TableRef,
    values: Vec<Condition>,
}

impl InsertBuilder {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            values: Vec::new(),
        }
    }

    /// Add a column-value pair
    #[must_use]
    pub fn value(mut self, column: &str, db_type: Option<DbType>, value: impl Into<DatabaseValue>) -> Self {
        self.values.push(Condition {
            column: column.to_string(),
            db_type,
            value: value.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn build(&self, dialect: DatabaseType) -> Command {
        let mut writer = SqlWriter::new(dialect);
        let table = writer.table(&self.table);
        if self.values.is_empty() {
            writer.push("INSERT INTO ").push(&table).push(" DEFAULT VALUES");
            return writer.finish();
        }

        let columns: Vec<String> = self.values.iter().map(|v| writer.quote(&v.column)).collect();
        writer
            .push("INSERT INTO ")
            .push(&table)
            .push(" (")
            .push(&columns.join(", "))
            .push(") VALUES (");
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                writer.push(", ");
            }
            writer.bind(&v.column, v.db_type, v.value.clone());
        }
        writer.push(")");
        writer.finish()
    }
}

/// UPDATE query builder
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    table: TableRef,
    set_values: Vec<Condition>,
    conditions: Vec<Condition>,
}

impl UpdateBuilder {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            set_values: Vec::new(),
            conditions: Vec::new(),
        }
    }

    #[must_use]
    pub fn set(mut self, column: &str, db_type: Option<DbType>, value: impl Into<DatabaseValue>) -> Self {
        self.set_values.push(Condition {
            column: column.to_string(),
            db_type,
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn matching(mut self, column: &str, db_type: Option<DbType>, value: impl Into<DatabaseValue>) -> Self {
        self.conditions.push(Condition {
            column: column.to_string(),
            db_type,
            value: value.into(),
        });
        self
    }

    pub fn has_assignments(&self) -> bool {
        !self.set_values.is_empty()
    }

    /// SET parameters come first, then WHERE parameters
    pub fn build(&self, dialect: DatabaseType) -> Command {
        let mut writer = SqlWriter::new(dialect);
        let table = writer.table(&self.table);
        writer.push("UPDATE ").push(&table).push(" SET ");
        for (i, v) in self.set_values.iter().enumerate() {
            if i > 0 {
                writer.push(", ");
            }
            let column = writer.quote(&v.column);
            writer.push(&column).push(" = ");
            writer.bind(&v.column, v.db_type, v.value.clone());
        }
        if !self.conditions.is_empty() {
            writer.push(" WHERE ");
            writer.conditions(&self.conditions);
        }
        writer.finish()
    }
}

/// DELETE query builder
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    table: TableRef,
    conditions: Vec<Condition>,
}

impl DeleteBuilder {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            conditions: Vec::new(),
        }
    }

    #[must_use]
    pub fn matching(mut self, column: &str, db_type: Option<DbType>, value: impl Into<DatabaseValue>) -> Self {
        self.conditions.push(Condition {
            column: column.to_string(),
            db_type,
            value: value.into(),
        });
        self
    }

    pub fn build(&self, dialect: DatabaseType) -> Command {
        let mut writer = SqlWriter::new(dialect);
        let table = writer.table(&self.table);
        writer.push("DELETE FROM ").push(&table);
        if !self.conditions.is_empty() {
            writer.push(" WHERE ");
            writer.conditions(&self.conditions);
        }
        writer.finish()
    }
}
