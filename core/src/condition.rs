//! Condition algebra: column predicates combined with `AND`/`OR`.
//!
//! A [`Condition`] is a single predicate over one column. A [`ConditionSet`]
//! is a boolean expression tree over conditions. Combining two sets never
//! concatenates text; instead each compound operand is marked *capsuled*
//! before it is nested under another operator, and the renderer wraps
//! capsuled nodes in parentheses. This keeps the rendered SQL minimal while
//! preserving the precedence the caller built.
//!
//! # Examples
//!
//! ```
//! use sqlservice_core::{Condition, Operator};
//!
//! let c1 = Condition::new("c1", Operator::Equal, 1);
//! let c2 = Condition::new("c2", Operator::Equal, 2);
//! let c3 = Condition::new("c3", Operator::Equal, 3);
//!
//! let set = c1.and(c2).or(c3);
//! assert_eq!(set.to_sql().unwrap(), "(c1 = 1 AND c2 = 2) OR c3 = 3");
//! ```

use std::ops::{BitAnd, BitOr};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value::{Value, join_literals, literal};

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan { or_equal: bool },
    LessThan { or_equal: bool },
    In,
    NotIn,
    IsNull,
    Like,
}

impl Operator {
    /// Whether this is a plain equality, the only form accepted as an
    /// `UPDATE` assignment.
    pub fn is_equal(&self) -> bool {
        matches!(self, Operator::Equal)
    }
}

/// A single predicate: `[table.]key <operator> [operand]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Owning table qualifier, set when the condition is merged into a join.
    pub table: Option<String>,
    /// Column name.
    pub key: String,
    /// Comparison operator.
    pub operation: Operator,
    /// Operand; `None` renders as `NULL`.
    pub value: Option<Value>,
}

impl Condition {
    /// Creates an unqualified condition with an operand.
    pub fn new(key: impl Into<String>, operation: Operator, value: impl Into<Value>) -> Self {
        Self {
            table: None,
            key: key.into(),
            operation,
            value: Some(value.into()),
        }
    }

    /// Creates an unqualified condition whose operand may be absent.
    pub fn with_optional(key: impl Into<String>, operation: Operator, value: Option<Value>) -> Self {
        Self {
            table: None,
            key: key.into(),
            operation,
            value,
        }
    }

    /// Creates an `IS NULL` condition.
    pub fn is_null(key: impl Into<String>) -> Self {
        Self::with_optional(key, Operator::IsNull, None)
    }

    /// Returns a copy of this condition qualified by `table`.
    pub fn qualified(&self, table: &str) -> Self {
        Self {
            table: Some(table.to_string()),
            ..self.clone()
        }
    }

    /// Wraps this condition in a [`ConditionSet::Single`].
    pub fn as_single(self) -> ConditionSet {
        ConditionSet::Single(self)
    }

    /// Combines two conditions with `AND`.
    pub fn and(self, other: impl Into<ConditionSet>) -> ConditionSet {
        self.as_single().and(other)
    }

    /// Combines two conditions with `OR`.
    pub fn or(self, other: impl Into<ConditionSet>) -> ConditionSet {
        self.as_single().or(other)
    }

    fn column(&self) -> String {
        match &self.table {
            Some(table) => format!("{table}.{}", self.key),
            None => self.key.clone(),
        }
    }

    /// Renders the condition as SQL text.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidArgument`](crate::QueryError::InvalidArgument)
    /// when `IN`/`NOT IN` is given an operand that is not a homogeneous list.
    pub fn to_sql(&self) -> Result<String> {
        let column = self.column();
        let value = self.value.as_ref();
        let text = match (self.operation, value) {
            (Operator::Equal, None) => format!("{column} IS NULL"),
            (Operator::NotEqual, None) => format!("{column} IS NOT NULL"),
            (Operator::Equal, _) => format!("{column} = {}", literal(value)),
            (Operator::NotEqual, _) => format!("{column} != {}", literal(value)),
            (Operator::GreaterThan { or_equal }, _) => {
                let op = if or_equal { ">=" } else { ">" };
                format!("{column} {op} {}", literal(value))
            }
            (Operator::LessThan { or_equal }, _) => {
                let op = if or_equal { "<=" } else { "<" };
                format!("{column} {op} {}", literal(value))
            }
            (Operator::In, _) => match list_operand(value)? {
                [] => "0 = 1".to_string(),
                items => format!("{column} IN ({})", join_literals(items)),
            },
            (Operator::NotIn, _) => match list_operand(value)? {
                [] => "1 = 1".to_string(),
                items => format!("{column} NOT IN ({})", join_literals(items)),
            },
            (Operator::IsNull, _) => format!("{column} IS NULL"),
            (Operator::Like, _) => format!("{column} LIKE {}", literal(value)),
        };
        Ok(text)
    }
}

fn list_operand(value: Option<&Value>) -> Result<&[Value]> {
    match value {
        Some(value) => value.as_list(),
        None => Err(crate::QueryError::InvalidArgument(
            "expected a list operand, found NULL".to_string(),
        )),
    }
}

/// A boolean expression tree over [`Condition`]s.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ConditionSet {
    /// No condition; the identity for both `and` and `or`.
    #[default]
    Empty,
    Single(Condition),
    And {
        left: Box<ConditionSet>,
        right: Box<ConditionSet>,
        capsuled: bool,
    },
    Or {
        left: Box<ConditionSet>,
        right: Box<ConditionSet>,
        capsuled: bool,
    },
}

impl ConditionSet {
    /// Builds an uncapsuled `And` node.
    pub fn and_of(left: ConditionSet, right: ConditionSet) -> Self {
        ConditionSet::And {
            left: Box::new(left),
            right: Box::new(right),
            capsuled: false,
        }
    }

    /// Builds an uncapsuled `Or` node.
    pub fn or_of(left: ConditionSet, right: ConditionSet) -> Self {
        ConditionSet::Or {
            left: Box::new(left),
            right: Box::new(right),
            capsuled: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ConditionSet::Empty)
    }

    /// Forces a compound node into parenthesized form. No-op for `Empty`
    /// and `Single`.
    pub fn capsuled(self) -> Self {
        match self {
            ConditionSet::And { left, right, .. } => ConditionSet::And {
                left,
                right,
                capsuled: true,
            },
            ConditionSet::Or { left, right, .. } => ConditionSet::Or {
                left,
                right,
                capsuled: true,
            },
            other => other,
        }
    }

    /// Combines with `AND`, capsuling compound operands.
    pub fn and(self, other: impl Into<ConditionSet>) -> Self {
        match (self, other.into()) {
            (ConditionSet::Empty, other) => other,
            (this, ConditionSet::Empty) => this,
            (this, other) => ConditionSet::and_of(this.capsuled(), other.capsuled()),
        }
    }

    /// Combines with `OR`, capsuling compound operands.
    pub fn or(self, other: impl Into<ConditionSet>) -> Self {
        match (self, other.into()) {
            (ConditionSet::Empty, other) => other,
            (this, ConditionSet::Empty) => this,
            (this, other) => ConditionSet::or_of(this.capsuled(), other.capsuled()),
        }
    }

    /// Returns a copy with every leaf qualified by `table`.
    pub fn qualified(&self, table: &str) -> Self {
        match self {
            ConditionSet::Empty => ConditionSet::Empty,
            ConditionSet::Single(condition) => ConditionSet::Single(condition.qualified(table)),
            ConditionSet::And {
                left,
                right,
                capsuled,
            } => ConditionSet::And {
                left: Box::new(left.qualified(table)),
                right: Box::new(right.qualified(table)),
                capsuled: *capsuled,
            },
            ConditionSet::Or {
                left,
                right,
                capsuled,
            } => ConditionSet::Or {
                left: Box::new(left.qualified(table)),
                right: Box::new(right.qualified(table)),
                capsuled: *capsuled,
            },
        }
    }

    /// Renders the expression tree; `Empty` renders as an empty string.
    pub fn to_sql(&self) -> Result<String> {
        match self {
            ConditionSet::Empty => Ok(String::new()),
            ConditionSet::Single(condition) => condition.to_sql(),
            ConditionSet::And {
                left,
                right,
                capsuled,
            } => Ok(wrap(
                format!("{} AND {}", left.to_sql()?, right.to_sql()?),
                *capsuled,
            )),
            ConditionSet::Or {
                left,
                right,
                capsuled,
            } => Ok(wrap(
                format!("{} OR {}", left.to_sql()?, right.to_sql()?),
                *capsuled,
            )),
        }
    }
}

fn wrap(text: String, capsuled: bool) -> String {
    if capsuled { format!("({text})") } else { text }
}

impl From<Condition> for ConditionSet {
    fn from(condition: Condition) -> Self {
        condition.as_single()
    }
}

impl<R: Into<ConditionSet>> BitAnd<R> for Condition {
    type Output = ConditionSet;

    fn bitand(self, rhs: R) -> ConditionSet {
        self.and(rhs)
    }
}

impl<R: Into<ConditionSet>> BitOr<R> for Condition {
    type Output = ConditionSet;

    fn bitor(self, rhs: R) -> ConditionSet {
        self.or(rhs)
    }
}

impl<R: Into<ConditionSet>> BitAnd<R> for ConditionSet {
    type Output = ConditionSet;

    fn bitand(self, rhs: R) -> ConditionSet {
        self.and(rhs)
    }
}

impl<R: Into<ConditionSet>> BitOr<R> for ConditionSet {
    type Output = ConditionSet;

    fn bitor(self, rhs: R) -> ConditionSet {
        self.or(rhs)
    }
}
