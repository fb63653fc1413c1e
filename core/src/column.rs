//! Column declarations and the typed column trait.
//!
//! A table's columns are declared once, as an enum implementing
//! [`TableColumn`]. The enum's [`ALL`](TableColumn::ALL) slice fixes the
//! canonical column order used by `INSERT` value lists, `CREATE TABLE`
//! and positional row decoding.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::condition::{Condition, Operator};
use crate::value::Value;

/// Constraint attached to a column declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnAttribute {
    PrimaryKey { auto_increment: bool },
    NotNull,
    Unique,
    Default(Value),
}

impl ColumnAttribute {
    pub fn is_primary_key(&self) -> bool {
        matches!(self, ColumnAttribute::PrimaryKey { .. })
    }

    /// Renders the attribute; primary keys render empty when the table uses
    /// a composite `PRIMARY KEY (..)` constraint instead.
    fn to_sql(&self, inline_primary_key: bool) -> Option<String> {
        match self {
            ColumnAttribute::PrimaryKey { .. } if !inline_primary_key => None,
            ColumnAttribute::PrimaryKey {
                auto_increment: false,
            } => Some("PRIMARY KEY".to_string()),
            ColumnAttribute::PrimaryKey {
                auto_increment: true,
            } => Some("PRIMARY KEY AUTOINCREMENT".to_string()),
            ColumnAttribute::NotNull => Some("NOT NULL".to_string()),
            ColumnAttribute::Unique => Some("UNIQUE".to_string()),
            ColumnAttribute::Default(value) => Some(format!("DEFAULT {}", value.to_sql())),
        }
    }
}

/// Declared storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataKind {
    Integer,
    Text,
    Real,
    Char(usize),
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Integer => f.write_str("INTEGER"),
            DataKind::Text => f.write_str("TEXT"),
            DataKind::Real => f.write_str("REAL"),
            DataKind::Char(size) => write!(f, "CHAR({size})"),
        }
    }
}

/// Untyped column declaration: name, data kind and ordered attributes.
///
/// # Examples
///
/// ```
/// use sqlservice_core::{ColumnAttribute, ColumnDecl, DataKind};
///
/// let id = ColumnDecl::new("id", DataKind::Integer)
///     .with_attribute(ColumnAttribute::PrimaryKey { auto_increment: true });
/// assert_eq!(id.to_sql(true), "id INTEGER PRIMARY KEY AUTOINCREMENT");
/// assert_eq!(id.to_sql(false), "id INTEGER");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDecl {
    pub name: String,
    pub kind: DataKind,
    pub attributes: Vec<ColumnAttribute>,
}

impl ColumnDecl {
    pub fn new(name: impl Into<String>, kind: DataKind) -> Self {
        Self {
            name: name.into(),
            kind,
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: ColumnAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.attributes.iter().any(ColumnAttribute::is_primary_key)
    }

    /// Renders `name KIND [attributes..]`.
    ///
    /// With `inline_primary_key == false` the `PRIMARY KEY` attribute is
    /// omitted so a composite table constraint can carry it.
    pub fn to_sql(&self, inline_primary_key: bool) -> String {
        let attributes: Vec<String> = self
            .attributes
            .iter()
            .filter_map(|a| a.to_sql(inline_primary_key))
            .collect();
        if attributes.is_empty() {
            format!("{} {}", self.name, self.kind)
        } else {
            format!("{} {} {}", self.name, self.kind, attributes.join(" "))
        }
    }
}

/// A typed column of a [`Table`](crate::Table), usually a fieldless enum.
///
/// Conditions are built directly from columns:
///
/// ```
/// use sqlservice_core::{ColumnDecl, DataKind, TableColumn};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum Col { Id, Name }
///
/// impl TableColumn for Col {
///     const ALL: &'static [Self] = &[Col::Id, Col::Name];
///
///     fn name(&self) -> &'static str {
///         match self {
///             Col::Id => "id",
///             Col::Name => "name",
///         }
///     }
///
///     fn declaration(&self) -> ColumnDecl {
///         match self {
///             Col::Id => ColumnDecl::new("id", DataKind::Integer),
///             Col::Name => ColumnDecl::new("name", DataKind::Text),
///         }
///     }
/// }
///
/// let set = Col::Id.gt(3) & Col::Name.is_in(vec!["a", "b"]);
/// assert_eq!(set.to_sql().unwrap(), "id > 3 AND name IN ('a', 'b')");
/// ```
pub trait TableColumn: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Every column, in canonical declaration order.
    const ALL: &'static [Self];

    /// Column name as it appears in SQL.
    fn name(&self) -> &'static str;

    /// Full declaration used by `CREATE TABLE` and `ADD COLUMN`.
    fn declaration(&self) -> ColumnDecl;

    fn eq(self, value: impl Into<Value>) -> Condition {
        Condition::new(self.name(), Operator::Equal, value)
    }

    /// Equality against an optional value; `None` renders `IS NULL`.
    fn eq_opt(self, value: Option<Value>) -> Condition {
        Condition::with_optional(self.name(), Operator::Equal, value)
    }

    fn not_eq(self, value: impl Into<Value>) -> Condition {
        Condition::new(self.name(), Operator::NotEqual, value)
    }

    fn gt(self, value: impl Into<Value>) -> Condition {
        Condition::new(self.name(), Operator::GreaterThan { or_equal: false }, value)
    }

    fn gte(self, value: impl Into<Value>) -> Condition {
        Condition::new(self.name(), Operator::GreaterThan { or_equal: true }, value)
    }

    fn lt(self, value: impl Into<Value>) -> Condition {
        Condition::new(self.name(), Operator::LessThan { or_equal: false }, value)
    }

    fn lte(self, value: impl Into<Value>) -> Condition {
        Condition::new(self.name(), Operator::LessThan { or_equal: true }, value)
    }

    fn is_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Condition {
        Condition::new(self.name(), Operator::In, Value::list(values))
    }

    fn not_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Condition {
        Condition::new(self.name(), Operator::NotIn, Value::list(values))
    }

    fn is_null(self) -> Condition {
        Condition::is_null(self.name())
    }

    fn like(self, pattern: impl Into<String>) -> Condition {
        Condition::new(self.name(), Operator::Like, pattern.into())
    }
}
