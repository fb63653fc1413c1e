//! Query statements and the DML compiler.
//!
//! Statements here are untyped: they carry table and column names as
//! strings. The typed builders in [`table`](crate::table) and
//! [`join`](crate::join) produce them. Compilation is pure and total apart
//! from operand validation and empty `SET` lists, and always yields one `;`-terminated statement.

use serde::{Deserialize, Serialize};

use crate::condition::{Condition, ConditionSet};
use crate::error::{QueryError, Result};
use crate::join::JoinStatement;
use crate::value::{Value, literal};

/// Columns selected by a `SELECT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    All,
    Some(Vec<String>),
}

impl Selection {
    pub(crate) fn to_sql(&self) -> String {
        match self {
            Selection::All => "*".to_string(),
            Selection::Some(columns) => columns.join(", "),
        }
    }

    /// Renders the selection qualified by `table`, as a join requires.
    pub(crate) fn qualified(&self, table: &str) -> Vec<String> {
        match self {
            Selection::All => vec![format!("{table}.*")],
            Selection::Some(columns) => columns.iter().map(|c| format!("{table}.{c}")).collect(),
        }
    }
}

/// Shared `WHERE`/`ORDER BY`/`LIMIT` state of a single-table query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Filter {
    pub conditions: ConditionSet,
    pub ascending: Vec<String>,
    pub descending: Vec<String>,
    pub limit: Option<u64>,
}

impl Filter {
    /// ANDs `conditions` onto the existing ones.
    pub fn filter(mut self, conditions: impl Into<ConditionSet>) -> Self {
        self.conditions = self.conditions.and(conditions);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        if ascending {
            self.ascending.push(column.into());
        } else {
            self.descending.push(column.into());
        }
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }
}

pub(crate) fn append_conditions(stmt: &mut String, conditions: &ConditionSet) -> Result<()> {
    let text = conditions.to_sql()?;
    if !text.is_empty() {
        stmt.push_str(" WHERE ");
        stmt.push_str(&text);
    }
    Ok(())
}

/// Appends `ORDER BY`, ascending columns first, then descending.
pub(crate) fn append_order(stmt: &mut String, ascending: &[String], descending: &[String]) {
    let order: Vec<String> = ascending
        .iter()
        .map(|c| format!("{c} ASC"))
        .chain(descending.iter().map(|c| format!("{c} DESC")))
        .collect();
    if !order.is_empty() {
        stmt.push_str(" ORDER BY ");
        stmt.push_str(&order.join(", "));
    }
}

pub(crate) fn append_limit(stmt: &mut String, limit: Option<u64>) {
    if let Some(limit) = limit {
        stmt.push_str(&format!(" LIMIT {limit}"));
    }
}

/// `SELECT {cols} FROM {table} [WHERE ..] [ORDER BY ..] [LIMIT n];`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStatement {
    pub table: String,
    pub selection: Selection,
    pub filter: Filter,
}

impl SelectStatement {
    pub fn new(table: impl Into<String>, selection: Selection) -> Self {
        Self {
            table: table.into(),
            selection,
            filter: Filter::default(),
        }
    }

    pub fn to_sql(&self) -> Result<String> {
        let mut stmt = format!("SELECT {} FROM {}", self.selection.to_sql(), self.table);
        append_conditions(&mut stmt, &self.filter.conditions)?;
        append_order(&mut stmt, &self.filter.ascending, &self.filter.descending);
        append_limit(&mut stmt, self.filter.limit);
        stmt.push(';');
        Ok(stmt)
    }
}

/// One `column = value` assignment of an `UPDATE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceSet {
    pub column: String,
    pub value: Option<Value>,
}

/// `UPDATE {table} SET {col = value, ..} [WHERE ..];`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStatement {
    pub table: String,
    pub replace: Vec<ReplaceSet>,
    pub conditions: ConditionSet,
}

impl UpdateStatement {
    /// Builds an update from equality conditions.
    ///
    /// Only `Equal` conditions are assignments; any other operator in
    /// `replace` is dropped.
    pub fn new(table: impl Into<String>, replace: impl IntoIterator<Item = Condition>) -> Self {
        let replace = replace
            .into_iter()
            .filter(|c| c.operation.is_equal())
            .map(|c| ReplaceSet {
                column: c.key,
                value: c.value,
            })
            .collect();
        Self {
            table: table.into(),
            replace,
            conditions: ConditionSet::Empty,
        }
    }

    /// # Errors
    ///
    /// Returns [`QueryError::InvalidArgument`] when no equality assignment
    /// is left to put in the `SET` clause, or an operand does not fit its
    /// operator.
    pub fn to_sql(&self) -> Result<String> {
        if self.replace.is_empty() {
            return Err(QueryError::InvalidArgument(format!(
                "update of {} has no column assignments",
                self.table
            )));
        }
        let assignments: Vec<String> = self
            .replace
            .iter()
            .map(|r| format!("{} = {}", r.column, literal(r.value.as_ref())))
            .collect();
        let mut stmt = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        append_conditions(&mut stmt, &self.conditions)?;
        stmt.push(';');
        Ok(stmt)
    }
}

/// `DELETE FROM {table} [WHERE ..];`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteStatement {
    pub table: String,
    pub conditions: ConditionSet,
}

impl DeleteStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: ConditionSet::Empty,
        }
    }

    pub fn to_sql(&self) -> Result<String> {
        let mut stmt = format!("DELETE FROM {}", self.table);
        append_conditions(&mut stmt, &self.conditions)?;
        stmt.push(';');
        Ok(stmt)
    }
}

/// Any compilable query.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(SelectStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    Join(JoinStatement),
}

impl Query {
    pub fn to_sql(&self) -> Result<String> {
        match self {
            Query::Select(s) => s.to_sql(),
            Query::Update(s) => s.to_sql(),
            Query::Delete(s) => s.to_sql(),
            Query::Join(s) => s.to_sql(),
        }
    }
}

/// Anything that compiles to a single SQL statement.
pub trait AsStatement {
    /// Compiles to SQL text.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidArgument`](crate::QueryError::InvalidArgument)
    /// if a condition operand does not fit its operator.
    fn as_statement(&self) -> Result<String>;
}

impl AsStatement for Query {
    fn as_statement(&self) -> Result<String> {
        self.to_sql()
    }
}

impl AsStatement for SelectStatement {
    fn as_statement(&self) -> Result<String> {
        self.to_sql()
    }
}

impl AsStatement for UpdateStatement {
    fn as_statement(&self) -> Result<String> {
        self.to_sql()
    }
}

impl AsStatement for DeleteStatement {
    fn as_statement(&self) -> Result<String> {
        self.to_sql()
    }
}
