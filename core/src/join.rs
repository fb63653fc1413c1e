//! Multi-table `SELECT .. JOIN` statements.
//!
//! A join is built by merging single-table select queries. Each side's
//! conditions and ordering columns are re-qualified with that side's table
//! name, and the condition sets are combined with the usual capsuling rules,
//! so the nesting inside each side survives the merge.

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::condition::ConditionSet;
use crate::error::Result;
use crate::query::{
    AsStatement, SelectStatement, Selection, append_conditions, append_limit, append_order,
};
use crate::table::{SelectQuery, Table};
use crate::column::TableColumn;

/// How a table is joined onto the base table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    Cross,
}

impl JoinKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::LeftOuter => "LEFT OUTER",
            JoinKind::Cross => "CROSS",
        }
    }
}

/// Columns selected from one table of a join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSelection {
    pub table: String,
    pub selection: Selection,
}

/// `{kind} JOIN {table} ON {base}.{left} = {table}.{right}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinOn {
    pub kind: JoinKind,
    pub table: String,
    pub left: String,
    pub right: String,
}

impl JoinOn {
    fn to_sql(&self, base: &str) -> String {
        format!(
            "{} JOIN {} ON {base}.{} = {}.{}",
            self.kind.as_sql(),
            self.table,
            self.left,
            self.table,
            self.right
        )
    }
}

/// A table-qualified ordering column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnInTable {
    pub table: String,
    pub column: String,
}

impl fmt::Display for ColumnInTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

fn qualify_columns(table: &str, columns: &[String]) -> Vec<ColumnInTable> {
    columns
        .iter()
        .map(|column| ColumnInTable {
            table: table.to_string(),
            column: column.clone(),
        })
        .collect()
}

fn min_limit(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Untyped join statement over a base table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinStatement {
    pub base: String,
    pub selections: Vec<JoinSelection>,
    pub joins: Vec<JoinOn>,
    pub conditions: ConditionSet,
    pub ascending: Vec<ColumnInTable>,
    pub descending: Vec<ColumnInTable>,
    pub limit: Option<u64>,
}

impl JoinStatement {
    /// Starts a join from the base table's select, qualifying its conditions
    /// and ordering columns.
    pub fn from_select(base: &SelectStatement) -> Self {
        let table = base.table.as_str();
        Self {
            base: base.table.clone(),
            selections: vec![JoinSelection {
                table: base.table.clone(),
                selection: base.selection.clone(),
            }],
            joins: Vec::new(),
            conditions: base.filter.conditions.qualified(table),
            ascending: qualify_columns(table, &base.filter.ascending),
            descending: qualify_columns(table, &base.filter.descending),
            limit: base.filter.limit,
        }
    }

    /// Joins another table's select onto this statement.
    ///
    /// `on` is `(base column, joined column)`. With `intersect` the two
    /// sides' conditions are ANDed, otherwise ORed. The resulting limit is
    /// the smaller of the two.
    pub fn join(
        mut self,
        kind: JoinKind,
        other: &SelectStatement,
        on: (&str, &str),
        intersect: bool,
    ) -> Self {
        let table = other.table.as_str();
        self.selections.push(JoinSelection {
            table: other.table.clone(),
            selection: other.selection.clone(),
        });
        self.joins.push(JoinOn {
            kind,
            table: other.table.clone(),
            left: on.0.to_string(),
            right: on.1.to_string(),
        });
        let other_conditions = other.filter.conditions.qualified(table);
        self.conditions = if intersect {
            self.conditions.and(other_conditions)
        } else {
            self.conditions.or(other_conditions)
        };
        self.ascending
            .extend(qualify_columns(table, &other.filter.ascending));
        self.descending
            .extend(qualify_columns(table, &other.filter.descending));
        self.limit = min_limit(self.limit, other.filter.limit);
        self
    }

    pub fn to_sql(&self) -> Result<String> {
        let columns: Vec<String> = self
            .selections
            .iter()
            .flat_map(|s| s.selection.qualified(&s.table))
            .collect();
        let mut stmt = format!("SELECT {} FROM {}", columns.join(", "), self.base);
        for join in &self.joins {
            stmt.push(' ');
            stmt.push_str(&join.to_sql(&self.base));
        }
        append_conditions(&mut stmt, &self.conditions)?;
        let ascending: Vec<String> = self.ascending.iter().map(ToString::to_string).collect();
        let descending: Vec<String> = self.descending.iter().map(ToString::to_string).collect();
        append_order(&mut stmt, &ascending, &descending);
        append_limit(&mut stmt, self.limit);
        stmt.push(';');
        Ok(stmt)
    }
}

impl AsStatement for JoinStatement {
    fn as_statement(&self) -> Result<String> {
        self.to_sql()
    }
}

/// Typed join rooted at base table `T`.
pub struct JoinQuery<T: Table> {
    statement: JoinStatement,
    _table: PhantomData<fn() -> T>,
}

impl<T: Table> Clone for JoinQuery<T> {
    fn clone(&self) -> Self {
        Self {
            statement: self.statement.clone(),
            _table: PhantomData,
        }
    }
}

impl<T: Table> fmt::Debug for JoinQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinQuery")
            .field("statement", &self.statement)
            .finish()
    }
}

impl<T: Table> JoinQuery<T> {
    pub(crate) fn start<R: Table>(
        base: &SelectQuery<T>,
        kind: JoinKind,
        other: &SelectQuery<R>,
        on: (T::Column, R::Column),
        intersect: bool,
    ) -> Self {
        let statement = JoinStatement::from_select(base.statement()).join(
            kind,
            other.statement(),
            (on.0.name(), on.1.name()),
            intersect,
        );
        Self {
            statement,
            _table: PhantomData,
        }
    }

    fn extend<R: Table>(
        self,
        kind: JoinKind,
        other: &SelectQuery<R>,
        on: (T::Column, R::Column),
        intersect: bool,
    ) -> Self {
        Self {
            statement: self.statement.join(
                kind,
                other.statement(),
                (on.0.name(), on.1.name()),
                intersect,
            ),
            _table: PhantomData,
        }
    }

    pub fn inner_join<R: Table>(
        self,
        other: &SelectQuery<R>,
        on: (T::Column, R::Column),
        intersect: bool,
    ) -> Self {
        self.extend(JoinKind::Inner, other, on, intersect)
    }

    pub fn outer_join<R: Table>(
        self,
        other: &SelectQuery<R>,
        on: (T::Column, R::Column),
        intersect: bool,
    ) -> Self {
        self.extend(JoinKind::LeftOuter, other, on, intersect)
    }

    pub fn cross_join<R: Table>(
        self,
        other: &SelectQuery<R>,
        on: (T::Column, R::Column),
        intersect: bool,
    ) -> Self {
        self.extend(JoinKind::Cross, other, on, intersect)
    }

    /// Overrides the merged limit.
    pub fn limit(mut self, count: u64) -> Self {
        self.statement.limit = Some(count);
        self
    }

    pub fn statement(&self) -> &JoinStatement {
        &self.statement
    }
}

impl<T: Table> AsStatement for JoinQuery<T> {
    fn as_statement(&self) -> Result<String> {
        self.statement.to_sql()
    }
}
