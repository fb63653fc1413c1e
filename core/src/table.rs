//! Typed table descriptors and the query builders rooted at them.
//!
//! A [`Table`] binds a name, a column enum and a row codec. The encode half
//! of the codec ([`Table::scalar`]) is driven by
//! [`TableColumn::ALL`](crate::TableColumn::ALL), so the `INSERT` value
//! list is always in declaration order; the decode half is the entity's
//! [`RowValue`] impl.
//!
//! Builders consume `self` and return the new query. Reusing a base query
//! for several derived ones means cloning it first.

use std::fmt;
use std::marker::PhantomData;

use crate::column::TableColumn;
use crate::condition::{Condition, ConditionSet};
use crate::ddl::{self, ConflictPolicy};
use crate::error::Result;
use crate::join::{JoinKind, JoinQuery};
use crate::query::{AsStatement, DeleteStatement, SelectStatement, Selection, UpdateStatement};
use crate::row::RowValue;
use crate::value::Value;

/// Static description of a table and its row codec.
pub trait Table: Sized + 'static {
    type Column: TableColumn;
    type Entity: RowValue;

    /// Table name as it appears in SQL.
    const NAME: &'static str;

    /// Value stored in `column` for `entity`; `None` is `NULL`.
    fn scalar(entity: &Self::Entity, column: Self::Column) -> Option<Value>;

    /// Optional script executed by a migration step at `version`.
    fn migrate_statement(_version: i32) -> Option<String> {
        None
    }

    /// Encodes an entity into values in canonical column order.
    fn serialize(entity: &Self::Entity) -> Vec<Option<Value>> {
        Self::Column::ALL
            .iter()
            .map(|column| Self::scalar(entity, *column))
            .collect()
    }

    fn column_names() -> Vec<&'static str> {
        Self::Column::ALL.iter().map(TableColumn::name).collect()
    }

    fn create_statement() -> String {
        Self::create_statement_as(Self::NAME)
    }

    /// `CREATE TABLE` for this layout under another name, e.g. the temp
    /// table of a column rename.
    fn create_statement_as(name: &str) -> String {
        let columns: Vec<_> = Self::Column::ALL
            .iter()
            .map(TableColumn::declaration)
            .collect();
        ddl::create_table(name, &columns)
    }

    fn insert_statement(entity: &Self::Entity, policy: ConflictPolicy) -> String {
        ddl::insert(
            Self::NAME,
            &Self::column_names(),
            &Self::serialize(entity),
            policy,
        )
    }

    fn drop_statement() -> String {
        ddl::drop_table(Self::NAME)
    }

    /// Renames `old_name` to this table's name.
    fn rename_statement(old_name: &str) -> String {
        ddl::rename_table(old_name, Self::NAME)
    }

    fn add_column_statement(column: Self::Column) -> String {
        ddl::add_column(Self::NAME, &column.declaration())
    }

    /// Copy-and-rename through `temp_{NAME}` (or `temp`), mapping
    /// `old_columns` onto `new_columns`.
    fn modify_columns_statement(
        temp: Option<&str>,
        new_columns: &[&str],
        old_columns: &[&str],
    ) -> String {
        let temp = temp.map_or_else(|| format!("temp_{}", Self::NAME), str::to_string);
        ddl::copy_and_rename(Self::NAME, &temp, new_columns, old_columns)
    }

    fn select_all() -> SelectQuery<Self> {
        SelectQuery::new(Selection::All)
    }

    fn select_some(columns: &[Self::Column]) -> SelectQuery<Self> {
        let names = columns.iter().map(|c| c.name().to_string()).collect();
        SelectQuery::new(Selection::Some(names))
    }

    /// `UPDATE` whose assignments are the equality conditions in `replace`.
    fn update(replace: impl IntoIterator<Item = Condition>) -> UpdateQuery<Self> {
        UpdateQuery {
            statement: UpdateStatement::new(Self::NAME, replace),
            _table: PhantomData,
        }
    }

    fn delete() -> DeleteQuery<Self> {
        DeleteQuery {
            statement: DeleteStatement::new(Self::NAME),
            _table: PhantomData,
        }
    }
}

/// Typed `SELECT` over table `T`.
pub struct SelectQuery<T: Table> {
    statement: SelectStatement,
    _table: PhantomData<fn() -> T>,
}

impl<T: Table> Clone for SelectQuery<T> {
    fn clone(&self) -> Self {
        Self {
            statement: self.statement.clone(),
            _table: PhantomData,
        }
    }
}

impl<T: Table> fmt::Debug for SelectQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectQuery")
            .field("statement", &self.statement)
            .finish()
    }
}

impl<T: Table> SelectQuery<T> {
    fn new(selection: Selection) -> Self {
        Self {
            statement: SelectStatement::new(T::NAME, selection),
            _table: PhantomData,
        }
    }

    /// ANDs `conditions` onto the query's conditions.
    #[must_use]
    pub fn filter(mut self, conditions: impl Into<ConditionSet>) -> Self {
        self.statement.filter = self.statement.filter.filter(conditions);
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: T::Column, ascending: bool) -> Self {
        self.statement.filter = self.statement.filter.order_by(column.name(), ascending);
        self
    }

    #[must_use]
    pub fn limit(mut self, count: u64) -> Self {
        self.statement.filter = self.statement.filter.limit(count);
        self
    }

    pub fn statement(&self) -> &SelectStatement {
        &self.statement
    }

    pub fn inner_join<R: Table>(
        &self,
        other: &SelectQuery<R>,
        on: (T::Column, R::Column),
        intersect: bool,
    ) -> JoinQuery<T> {
        JoinQuery::start(self, JoinKind::Inner, other, on, intersect)
    }

    pub fn outer_join<R: Table>(
        &self,
        other: &SelectQuery<R>,
        on: (T::Column, R::Column),
        intersect: bool,
    ) -> JoinQuery<T> {
        JoinQuery::start(self, JoinKind::LeftOuter, other, on, intersect)
    }

    pub fn cross_join<R: Table>(
        &self,
        other: &SelectQuery<R>,
        on: (T::Column, R::Column),
        intersect: bool,
    ) -> JoinQuery<T> {
        JoinQuery::start(self, JoinKind::Cross, other, on, intersect)
    }
}

impl<T: Table> AsStatement for SelectQuery<T> {
    fn as_statement(&self) -> Result<String> {
        self.statement.to_sql()
    }
}

/// Typed `UPDATE` over table `T`.
pub struct UpdateQuery<T: Table> {
    statement: UpdateStatement,
    _table: PhantomData<fn() -> T>,
}

impl<T: Table> Clone for UpdateQuery<T> {
    fn clone(&self) -> Self {
        Self {
            statement: self.statement.clone(),
            _table: PhantomData,
        }
    }
}

impl<T: Table> fmt::Debug for UpdateQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateQuery")
            .field("statement", &self.statement)
            .finish()
    }
}

impl<T: Table> UpdateQuery<T> {
    #[must_use]
    pub fn filter(mut self, conditions: impl Into<ConditionSet>) -> Self {
        self.statement.conditions = self.statement.conditions.and(conditions);
        self
    }

    pub fn statement(&self) -> &UpdateStatement {
        &self.statement
    }
}

impl<T: Table> AsStatement for UpdateQuery<T> {
    fn as_statement(&self) -> Result<String> {
        self.statement.to_sql()
    }
}

/// Typed `DELETE` over table `T`.
pub struct DeleteQuery<T: Table> {
    statement: DeleteStatement,
    _table: PhantomData<fn() -> T>,
}

impl<T: Table> Clone for DeleteQuery<T> {
    fn clone(&self) -> Self {
        Self {
            statement: self.statement.clone(),
            _table: PhantomData,
        }
    }
}

impl<T: Table> fmt::Debug for DeleteQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteQuery")
            .field("statement", &self.statement)
            .finish()
    }
}

impl<T: Table> DeleteQuery<T> {
    #[must_use]
    pub fn filter(mut self, conditions: impl Into<ConditionSet>) -> Self {
        self.statement.conditions = self.statement.conditions.and(conditions);
        self
    }

    pub fn statement(&self) -> &DeleteStatement {
        &self.statement
    }
}

impl<T: Table> AsStatement for DeleteQuery<T> {
    fn as_statement(&self) -> Result<String> {
        self.statement.to_sql()
    }
}
