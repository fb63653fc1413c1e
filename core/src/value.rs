//! Scalar values that can appear as a column value or a literal operand.
//!
//! [`Value`] is the closed set of primitives the statement compiler knows how
//! to render. Lists only ever appear as the operand of `IN`/`NOT IN`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

/// Kind of a scalar, used to check list homogeneity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarKind {
    Integer,
    Real,
    Text,
    Boolean,
    List,
}

/// A primitive value storable in a single column.
///
/// # Examples
///
/// ```
/// use sqlservice_core::Value;
///
/// assert_eq!(Value::from("it's").to_sql(), "'it''s'");
/// assert_eq!(Value::from(true).to_sql(), "1");
/// assert_eq!(Value::from(vec![2, 3, 4]).to_sql(), "(2, 3, 4)");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    /// Ordered list of scalars of one kind.
    List(Vec<Value>),
}

impl Value {
    /// Builds a list value from any iterator of convertible scalars.
    pub fn list<T, I>(items: I) -> Self
    where
        T: Into<Value>,
        I: IntoIterator<Item = T>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Returns the kind of this scalar.
    pub fn kind(&self) -> ScalarKind {
        match self {
            Value::Integer(_) => ScalarKind::Integer,
            Value::Real(_) => ScalarKind::Real,
            Value::Text(_) => ScalarKind::Text,
            Value::Boolean(_) => ScalarKind::Boolean,
            Value::List(_) => ScalarKind::List,
        }
    }

    /// Renders the value as an SQL literal.
    ///
    /// Text is single-quoted with embedded quotes doubled, booleans render as
    /// `0`/`1`, and lists render as a parenthesized, comma-joined sequence.
    pub fn to_sql(&self) -> String {
        match self {
            Value::Integer(n) => n.to_string(),
            Value::Real(n) if n.is_finite() => format!("{n:?}"),
            Value::Real(_) => "NULL".to_string(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Boolean(b) => String::from(if *b { "1" } else { "0" }),
            Value::List(items) => format!("({})", join_literals(items)),
        }
    }

    /// Returns the list elements, or fails if this is not a homogeneous list.
    pub(crate) fn as_list(&self) -> Result<&[Value]> {
        let Value::List(items) = self else {
            return Err(QueryError::InvalidArgument(format!(
                "expected a list operand, found {:?}",
                self.kind()
            )));
        };
        if let Some(first) = items.first() {
            let kind = first.kind();
            if let Some(other) = items.iter().find(|v| v.kind() != kind) {
                return Err(QueryError::InvalidArgument(format!(
                    "list mixes {kind:?} and {:?} elements",
                    other.kind()
                )));
            }
        }
        Ok(items)
    }
}

pub(crate) fn join_literals(items: &[Value]) -> String {
    items.iter().map(Value::to_sql).collect::<Vec<_>>().join(", ")
}

/// Renders an optional value, mapping `None` to `NULL`.
pub(crate) fn literal(value: Option<&Value>) -> String {
    value.map_or_else(|| "NULL".to_string(), Value::to_sql)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Integer(i64::from(n))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Real(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Real(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(s.clone())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items)
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(items: &[T]) -> Self {
        Value::list(items.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_quotes_are_doubled() {
        assert_eq!(Value::from("O'Brien").to_sql(), "'O''Brien'");
        assert_eq!(Value::from("plain").to_sql(), "'plain'");
    }

    #[test]
    fn test_boolean_renders_as_integer() {
        assert_eq!(Value::from(true).to_sql(), "1");
        assert_eq!(Value::from(false).to_sql(), "0");
    }

    #[test]
    fn test_real_keeps_fraction() {
        assert_eq!(Value::from(2.0).to_sql(), "2.0");
        assert_eq!(Value::from(0.25).to_sql(), "0.25");
        assert_eq!(Value::from(f64::NAN).to_sql(), "NULL");
    }

    #[test]
    fn test_as_list_rejects_scalar_and_mixed_lists() {
        assert!(Value::from(1).as_list().is_err());
        let mixed = Value::List(vec![Value::from(1), Value::from("a")]);
        assert!(mixed.as_list().is_err());
        assert_eq!(Value::from(vec![1, 2]).as_list().unwrap().len(), 2);
        assert!(Value::List(vec![]).as_list().unwrap().is_empty());
    }

    #[test]
    fn test_value_serializes_with_variant_tag() {
        let json = serde_json::to_string(&Value::from(3)).unwrap();
        assert_eq!(json, r#"{"Integer":3}"#);
    }
}
