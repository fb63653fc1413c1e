//! Row decoding: a positional cursor over one result row.
//!
//! The engine materializes each result row as a [`Cursor`] and hands it to a
//! row codec ([`RowValue`]). Codecs read columns with [`Cursor::next`] in
//! the order the query selected them, or by name with [`Cursor::get`].

use crate::column::TableColumn;
use crate::error::{QueryError, Result};
use crate::value::Value;

/// Conversion from a stored scalar into a Rust value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(n) => Some(*n),
            Value::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|n| i32::try_from(n).ok())
    }
}

impl FromValue for u32 {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|n| u32::try_from(n).ok())
    }
}

impl FromValue for usize {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|n| usize::try_from(n).ok())
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Real(n) => Some(*n),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(b) => Some(*b),
            Value::Integer(n) => Some(*n != 0),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

/// A decoded result row with a read position.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    names: Vec<String>,
    values: Vec<Option<Value>>,
    index: usize,
}

impl Cursor {
    /// Creates a cursor positioned at the first column.
    ///
    /// `names` and `values` are parallel; `None` is a SQL `NULL`.
    pub fn new(names: Vec<String>, values: Vec<Option<Value>>) -> Self {
        Self {
            names,
            values,
            index: 0,
        }
    }

    /// Reads the current column and advances.
    ///
    /// Returns `None` for `NULL`, for a value that does not convert to `T`,
    /// and past the last column.
    #[allow(clippy::should_implement_trait)]
    pub fn next<T: FromValue>(&mut self) -> Option<T> {
        let index = self.index;
        self.index += 1;
        self.values
            .get(index)
            .and_then(Option::as_ref)
            .and_then(T::from_value)
    }

    /// Reads the current column and advances, failing if it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Decode`] when the column is `NULL`, missing, or
    /// of an incompatible type.
    pub fn require<T: FromValue>(&mut self) -> Result<T> {
        let index = self.index;
        self.next().ok_or_else(|| {
            QueryError::Decode(format!(
                "column {index} ({}) has no value of type {}",
                self.names.get(index).map_or("?", String::as_str),
                std::any::type_name::<T>()
            ))
        })
    }

    /// Reads a column by name without moving the cursor.
    pub fn get<T: FromValue>(&self, name: &str) -> Option<T> {
        let index = self.names.iter().position(|n| n == name)?;
        self.values
            .get(index)
            .and_then(Option::as_ref)
            .and_then(T::from_value)
    }

    /// Reads a typed table column by name without moving the cursor.
    pub fn column<T: FromValue, C: TableColumn>(&self, column: C) -> Option<T> {
        self.get(column.name())
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A value decodable from one result row.
pub trait RowValue: Sized {
    /// Decodes a row.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Decode`] when a required column is missing.
    fn decode(cursor: &mut Cursor) -> Result<Self>;
}

macro_rules! impl_row_value_for_scalar {
    ($($ty:ty),*) => {
        $(
            impl RowValue for $ty {
                fn decode(cursor: &mut Cursor) -> Result<Self> {
                    cursor.require()
                }
            }
        )*
    };
}

impl_row_value_for_scalar!(i64, i32, u32, usize, f64, bool, String);

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor() -> Cursor {
        Cursor::new(
            vec!["id".into(), "name".into(), "age".into(), "active".into()],
            vec![
                Some(Value::Integer(3)),
                Some(Value::Text("sudo".into())),
                None,
                Some(Value::Integer(1)),
            ],
        )
    }

    #[test]
    fn test_next_reads_in_order_and_advances() {
        let mut cursor = cursor();
        assert_eq!(cursor.next::<i64>(), Some(3));
        assert_eq!(cursor.next::<String>(), Some("sudo".to_string()));
        assert_eq!(cursor.next::<i64>(), None);
        assert_eq!(cursor.next::<bool>(), Some(true));
        assert_eq!(cursor.next::<i64>(), None);
    }

    #[test]
    fn test_require_reports_missing_column() {
        let mut cursor = cursor();
        cursor.next::<i64>();
        cursor.next::<String>();
        let err = cursor.require::<i64>().unwrap_err();
        assert!(matches!(err, QueryError::Decode(msg) if msg.contains("age")));
    }

    #[test]
    fn test_get_by_name_does_not_move() {
        let mut cursor = cursor();
        assert_eq!(cursor.get::<String>("name"), Some("sudo".to_string()));
        assert_eq!(cursor.get::<i64>("missing"), None);
        assert_eq!(cursor.next::<i64>(), Some(3));
    }
}
