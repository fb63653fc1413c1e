//! Error types for statement generation.
//!
//! Statement generation is pure, so its failures are caller mistakes that
//! can be detected before anything reaches the engine. Row codecs report
//! missing columns through the same type.

use thiserror::Error;

/// Errors that can occur while compiling a query to SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// An operand is incompatible with its operator (e.g. a non-list
    /// operand given to `IN`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A row codec could not produce a value from a result row.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Convenience alias for results with [`QueryError`].
pub type Result<T> = std::result::Result<T, QueryError>;
