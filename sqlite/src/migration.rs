//! Versioned schema migration.
//!
//! A [`Migration`] walks the database's persisted `user_version` forward to
//! a target, calling its step function once per version and persisting each
//! bump as soon as the step succeeds. Steps are responsible for their own
//! atomicity (see [`Database::execute_transaction`]). When run through
//! [`Engine::migrate`](crate::Engine::migrate), no other job can observe an
//! intermediate version.
//!
//! # Example
//!
//! ```no_run
//! use sqlservice_sqlite::{Database, Migration};
//!
//! let db = Database::new();
//! db.open("app.db").unwrap();
//!
//! let migration = Migration::new(2, |version, db| match version {
//!     0 => db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);"),
//!     1 => db.execute("ALTER TABLE users ADD COLUMN nickname TEXT;"),
//!     _ => Ok(()),
//! });
//! assert_eq!(migration.run(&db).unwrap(), 2);
//! ```

use std::fmt;

use sqlservice_core::Table;
use tracing::{info, warn};

use crate::database::Database;
use crate::error::{Result, SqliteError};

type StepFn = Box<dyn FnMut(i32, &Database) -> Result<()> + Send>;
type FinalizeFn = Box<dyn FnOnce(i32, &Database) + Send>;

/// A migration recipe: a target version, a step per version and an optional
/// finalizer.
pub struct Migration {
    target: i32,
    step: StepFn,
    finalize: Option<FinalizeFn>,
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("target", &self.target)
            .field("finalize", &self.finalize.is_some())
            .finish_non_exhaustive()
    }
}

impl Migration {
    /// Creates a migration up to `target`.
    ///
    /// `step(v, db)` moves the schema from version `v` to `v + 1`.
    pub fn new(
        target: i32,
        step: impl FnMut(i32, &Database) -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            target,
            step: Box::new(step),
            finalize: None,
        }
    }

    /// Migration whose steps are `T`'s per-version migration scripts.
    pub fn table<T: Table>(target: i32) -> Self {
        Self::new(target, |version, db| db.migrate_table::<T>(version))
    }

    /// Adds a callback invoked once with the final version, after the last
    /// step or immediately if the database is already at or past the target.
    pub fn with_finalize(mut self, finalize: impl FnOnce(i32, &Database) + Send + 'static) -> Self {
        self.finalize = Some(Box::new(finalize));
        self
    }

    pub fn target(&self) -> i32 {
        self.target
    }

    /// Runs the remaining steps against `db` and returns the final version.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Migration`] for the first failing step. The
    /// persisted version is left at the last step that succeeded and the
    /// finalizer is not called.
    pub fn run(mut self, db: &Database) -> Result<i32> {
        let mut version = db.user_version()?;
        while version < self.target {
            let next = version + 1;
            if let Err(e) = (self.step)(version, db) {
                warn!(from = version, to = next, error = %e, "migration step failed");
                return Err(match e {
                    SqliteError::Migration(_) => e,
                    other => SqliteError::Migration(format!("step {version} -> {next}: {other}")),
                });
            }
            db.update_user_version(next).map_err(|e| {
                SqliteError::Migration(format!("failed to persist version {next}: {e}"))
            })?;
            info!(from = version, to = next, "applied migration step");
            version = next;
        }
        if let Some(finalize) = self.finalize {
            finalize(version, db);
        }
        info!(version, target = self.target, "migration finished");
        Ok(version)
    }
}
