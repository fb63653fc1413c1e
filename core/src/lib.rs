//! Typed query construction for an embedded SQL engine.
//!
//! This crate is pure: it builds query values and compiles them to SQL text,
//! but never touches a connection.
//!
//! - [`Value`] is the closed set of scalars a column or operand can hold.
//! - [`Condition`] and [`ConditionSet`] form the condition algebra. Combining
//!   sets marks compound operands as *capsuled* so the rendered text keeps
//!   the precedence the caller built.
//! - [`Table`] and [`TableColumn`] describe a table's name, ordered columns
//!   and row codec. They are the roots of the typed builders
//!   ([`SelectQuery`], [`UpdateQuery`], [`DeleteQuery`], [`JoinQuery`]).
//! - [`AsStatement`] compiles any query to a single `;`-terminated statement.
//!   [`ddl`] holds the schema and migration primitives.
//! - [`Cursor`] and [`RowValue`] decode result rows positionally.
//!
//! # Example
//!
//! ```
//! use sqlservice_core::*;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum UserColumn { Id, Name }
//!
//! impl TableColumn for UserColumn {
//!     const ALL: &'static [Self] = &[UserColumn::Id, UserColumn::Name];
//!
//!     fn name(&self) -> &'static str {
//!         match self {
//!             UserColumn::Id => "id",
//!             UserColumn::Name => "name",
//!         }
//!     }
//!
//!     fn declaration(&self) -> ColumnDecl {
//!         match self {
//!             UserColumn::Id => ColumnDecl::new("id", DataKind::Integer)
//!                 .with_attribute(ColumnAttribute::PrimaryKey { auto_increment: false }),
//!             UserColumn::Name => ColumnDecl::new("name", DataKind::Text),
//!         }
//!     }
//! }
//!
//! struct User { id: i64, name: String }
//!
//! impl RowValue for User {
//!     fn decode(cursor: &mut Cursor) -> sqlservice_core::Result<Self> {
//!         Ok(User { id: cursor.require()?, name: cursor.require()? })
//!     }
//! }
//!
//! struct Users;
//!
//! impl Table for Users {
//!     type Column = UserColumn;
//!     type Entity = User;
//!     const NAME: &'static str = "users";
//!
//!     fn scalar(user: &User, column: UserColumn) -> Option<Value> {
//!         match column {
//!             UserColumn::Id => Some(user.id.into()),
//!             UserColumn::Name => Some(user.name.as_str().into()),
//!         }
//!     }
//! }
//!
//! let query = Users::select_all()
//!     .filter(UserColumn::Id.gt(3) | UserColumn::Name.like("a%"))
//!     .order_by(UserColumn::Id, false)
//!     .limit(5);
//! assert_eq!(
//!     query.as_statement().unwrap(),
//!     "SELECT * FROM users WHERE id > 3 OR name LIKE 'a%' ORDER BY id DESC LIMIT 5;"
//! );
//! ```

mod column;
mod condition;
pub mod ddl;
mod error;
mod join;
mod query;
mod row;
mod table;
mod value;

pub use column::{ColumnAttribute, ColumnDecl, DataKind, TableColumn};
pub use condition::{Condition, ConditionSet, Operator};
pub use ddl::ConflictPolicy;
pub use error::{QueryError, Result};
pub use join::{ColumnInTable, JoinKind, JoinOn, JoinQuery, JoinSelection, JoinStatement};
pub use query::{
    AsStatement, DeleteStatement, Filter, Query, ReplaceSet, SelectStatement, Selection,
    UpdateStatement,
};
pub use row::{Cursor, FromValue, RowValue};
pub use table::{DeleteQuery, SelectQuery, Table, UpdateQuery};
pub use value::{ScalarKind, Value};
