//! Error types for the SQLite engine.
//!
//! Every engine failure carries the native SQLite message. Query
//! compilation errors from `sqlservice-core` convert into this type so a
//! job can use `?` on both.

use sqlservice_core::QueryError;
use thiserror::Error;

/// Errors that can occur while opening, querying or migrating a database.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// The connection could not be established.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Close was called with no open connection, or SQLite refused to close.
    #[error("failed to close database: {0}")]
    Close(String),

    /// SQLite rejected the statement text.
    #[error("failed to prepare statement: {0}")]
    Prepare(String),

    /// Execution or row decoding failed.
    #[error("failed to step statement: {0}")]
    Step(String),

    /// A multi-statement transaction failed and was rolled back.
    #[error("transaction rolled back: {0}")]
    Transaction(String),

    /// A migration step failed; the version was not bumped for that step.
    #[error("migration failed: {0}")]
    Migration(String),

    /// A condition operand does not fit its operator.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation needs an open connection.
    #[error("database is not open")]
    NotOpen,

    /// A pragma or raw statement failed.
    #[error("failed to execute statement: {0}")]
    Execute(String),

    /// A job panicked on the access lane; the lane itself keeps running.
    #[error("job panicked: {0}")]
    Panicked(String),

    /// The engine's worker lanes have shut down.
    #[error("engine lanes have shut down")]
    Disconnected,

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// File I/O or thread spawn failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<QueryError> for SqliteError {
    fn from(error: QueryError) -> Self {
        match error {
            QueryError::InvalidArgument(message) => SqliteError::InvalidArgument(message),
            QueryError::Decode(message) => SqliteError::Step(message),
        }
    }
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
