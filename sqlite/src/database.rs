//! The database handle jobs run against.
//!
//! [`Database`] wraps at most one [`rusqlite::Connection`] and exposes the
//! typed operations of `sqlservice-core`: every query is compiled to SQL
//! text, prepared, stepped, and its rows are materialized as [`Cursor`]s for
//! the table's row codec. Statement errors are classified as
//! [`Prepare`](SqliteError::Prepare) or [`Step`](SqliteError::Step) by the
//! phase that failed.
//!
//! A `Database` is not shared directly; the [`Engine`](crate::Engine) owns
//! it and lends `&Database` to jobs under its exclusion.

use std::cell::RefCell;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use sqlservice_core::{
    AsStatement, ConflictPolicy, Cursor, DeleteQuery, FromValue, JoinQuery, RowValue,
    SelectQuery, Table, UpdateQuery, Value,
};
use tracing::{debug, warn};

use crate::config::JournalMode;
use crate::error::{Result, SqliteError};

fn prepare_error(e: rusqlite::Error) -> SqliteError {
    SqliteError::Prepare(e.to_string())
}

fn step_error(e: rusqlite::Error) -> SqliteError {
    SqliteError::Step(e.to_string())
}

fn execute_error(e: rusqlite::Error) -> SqliteError {
    SqliteError::Execute(e.to_string())
}

fn transaction_error(e: rusqlite::Error) -> SqliteError {
    SqliteError::Transaction(e.to_string())
}

fn scalar(value: ValueRef<'_>) -> Option<Value> {
    match value {
        ValueRef::Integer(n) => Some(Value::Integer(n)),
        ValueRef::Real(n) => Some(Value::Real(n)),
        ValueRef::Text(text) => Some(Value::Text(String::from_utf8_lossy(text).into_owned())),
        ValueRef::Null | ValueRef::Blob(_) => None,
    }
}

/// Prepares and steps a statement that returns no rows.
fn execute_statement(conn: &Connection, sql: &str) -> Result<usize> {
    debug!(sql = %sql, "executing statement");
    let mut stmt = conn.prepare(sql).map_err(prepare_error)?;
    stmt.execute([]).map_err(step_error)
}

/// Runs a query and hands each row to `f` as a fresh cursor.
fn for_each_row(
    conn: &Connection,
    sql: &str,
    mut f: impl FnMut(Cursor) -> Result<()>,
) -> Result<()> {
    debug!(sql = %sql, "querying rows");
    let mut stmt = conn.prepare(sql).map_err(prepare_error)?;
    let names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let mut rows = stmt.query([]).map_err(step_error)?;
    while let Some(row) = rows.next().map_err(step_error)? {
        let values = (0..names.len())
            .map(|index| row.get_ref(index).map(scalar))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(step_error)?;
        f(Cursor::new(names.clone(), values))?;
    }
    Ok(())
}

/// A lazily opened SQLite connection plus the typed operations over it.
#[derive(Debug, Default)]
pub struct Database {
    connection: RefCell<Option<Connection>>,
}

impl Database {
    /// Creates a handle with no open connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or creates) the database file at `path`, replacing any
    /// connection already held.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Open`] if SQLite cannot open the file.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| SqliteError::Open(format!("{}: {e}", path.display())))?;
        self.install(conn)
    }

    /// Opens an existing database file without write access.
    pub fn open_read_only(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| SqliteError::Open(format!("{}: {e}", path.display())))?;
        self.install(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory(&self) -> Result<()> {
        let conn = Connection::open_in_memory().map_err(|e| SqliteError::Open(e.to_string()))?;
        self.install(conn)
    }

    fn install(&self, conn: Connection) -> Result<()> {
        let mut slot = self
            .connection
            .try_borrow_mut()
            .map_err(|_| SqliteError::Open("connection is in use".to_string()))?;
        *slot = Some(conn);
        Ok(())
    }

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Close`] if nothing is open or SQLite refuses to
    /// close; in the latter case the connection stays open.
    pub fn close(&self) -> Result<()> {
        let mut slot = self
            .connection
            .try_borrow_mut()
            .map_err(|_| SqliteError::Close("connection is in use".to_string()))?;
        let conn = slot
            .take()
            .ok_or_else(|| SqliteError::Close("no open connection".to_string()))?;
        if let Err((conn, e)) = conn.close() {
            *slot = Some(conn);
            return Err(SqliteError::Close(e.to_string()));
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.connection
            .try_borrow()
            .is_ok_and(|slot| slot.is_some())
    }

    /// Runs `f` against the raw connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::NotOpen`] if no connection is open.
    pub fn with_connection<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let slot = self
            .connection
            .try_borrow()
            .map_err(|_| SqliteError::NotOpen)?;
        let conn = slot.as_ref().ok_or(SqliteError::NotOpen)?;
        f(conn)
    }

    /// Executes a raw, possibly multi-statement script.
    pub fn execute(&self, sql: &str) -> Result<()> {
        self.with_connection(|conn| {
            debug!(sql = %sql, "executing script");
            conn.execute_batch(sql).map_err(execute_error)
        })
    }

    /// Reads the persisted schema version (`PRAGMA user_version`).
    pub fn user_version(&self) -> Result<i32> {
        self.with_connection(|conn| {
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
                .map_err(execute_error)
        })
    }

    pub fn update_user_version(&self, version: i32) -> Result<()> {
        self.execute(&format!("PRAGMA user_version = {version};"))
    }

    pub fn journal_mode(&self) -> Result<JournalMode> {
        self.with_connection(|conn| {
            let mode: String = conn
                .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
                .map_err(execute_error)?;
            JournalMode::from_pragma(&mode)
                .ok_or_else(|| SqliteError::Execute(format!("unknown journal mode: {mode}")))
        })
    }

    /// Sets the journal mode and returns the mode SQLite actually applied,
    /// which may differ (an in-memory database stays `MEMORY`).
    pub fn update_journal_mode(&self, mode: JournalMode) -> Result<JournalMode> {
        self.with_connection(|conn| {
            let sql = format!("PRAGMA journal_mode = {};", mode.as_str());
            debug!(sql = %sql, "updating journal mode");
            let applied: String = conn
                .query_row(&sql, [], |row| row.get(0))
                .map_err(execute_error)?;
            JournalMode::from_pragma(&applied)
                .ok_or_else(|| SqliteError::Execute(format!("unknown journal mode: {applied}")))
        })
    }

    pub fn create_table_if_not_exists<T: Table>(&self) -> Result<()> {
        self.with_connection(|conn| execute_statement(conn, &T::create_statement()).map(drop))
    }

    pub fn drop_table<T: Table>(&self) -> Result<()> {
        self.with_connection(|conn| execute_statement(conn, &T::drop_statement()).map(drop))
    }

    /// Runs the table's migration script for `version`, if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Migration`] if the script fails.
    pub fn migrate_table<T: Table>(&self, version: i32) -> Result<()> {
        let Some(script) = T::migrate_statement(version) else {
            return Ok(());
        };
        self.with_connection(|conn| {
            debug!(table = T::NAME, version, sql = %script, "migrating table");
            conn.execute_batch(&script)
                .map_err(|e| SqliteError::Migration(format!("{} at version {version}: {e}", T::NAME)))
        })
    }

    /// Loads every entity matched by `query`, creating the table first if
    /// needed.
    ///
    /// # Errors
    ///
    /// A row the codec cannot decode aborts the load with
    /// [`SqliteError::Step`].
    pub fn load<T: Table>(&self, query: &SelectQuery<T>) -> Result<Vec<T::Entity>> {
        self.create_table_if_not_exists::<T>()?;
        self.load_rows(query)
    }

    /// Like [`load`](Self::load), but skips rows the codec cannot decode.
    pub fn load_lenient<T: Table>(&self, query: &SelectQuery<T>) -> Result<Vec<T::Entity>> {
        self.create_table_if_not_exists::<T>()?;
        let sql = query.as_statement()?;
        let mut entities = Vec::new();
        self.with_connection(|conn| {
            for_each_row(conn, &sql, |mut cursor| {
                match T::Entity::decode(&mut cursor) {
                    Ok(entity) => entities.push(entity),
                    Err(e) => warn!(table = T::NAME, error = %e, "skipping undecodable row"),
                }
                Ok(())
            })
        })?;
        Ok(entities)
    }

    /// Loads rows through a custom mapping; rows mapped to `None` are
    /// skipped.
    pub fn load_with<T: Table, R>(
        &self,
        query: &SelectQuery<T>,
        mapping: impl FnMut(&mut Cursor) -> Option<R>,
    ) -> Result<Vec<R>> {
        self.create_table_if_not_exists::<T>()?;
        self.load_mapped(&query.as_statement()?, mapping)
    }

    /// Loads the rows of a join through a custom mapping.
    pub fn load_join_with<T: Table, R>(
        &self,
        query: &JoinQuery<T>,
        mapping: impl FnMut(&mut Cursor) -> Option<R>,
    ) -> Result<Vec<R>> {
        self.load_mapped(&query.as_statement()?, mapping)
    }

    fn load_mapped<R>(
        &self,
        sql: &str,
        mut mapping: impl FnMut(&mut Cursor) -> Option<R>,
    ) -> Result<Vec<R>> {
        let mut results = Vec::new();
        self.with_connection(|conn| {
            for_each_row(conn, sql, |mut cursor| {
                results.extend(mapping(&mut cursor));
                Ok(())
            })
        })?;
        Ok(results)
    }

    /// Decodes every row of any compiled query with `R`'s codec.
    pub fn load_rows<R: RowValue>(&self, query: &impl AsStatement) -> Result<Vec<R>> {
        let sql = query.as_statement()?;
        let mut rows = Vec::new();
        self.with_connection(|conn| {
            for_each_row(conn, &sql, |mut cursor| {
                rows.push(R::decode(&mut cursor)?);
                Ok(())
            })
        })?;
        Ok(rows)
    }

    /// Loads the first entity matched by `query` (with `LIMIT 1`).
    pub fn load_one<T: Table>(&self, query: &SelectQuery<T>) -> Result<Option<T::Entity>> {
        let query = query.clone().limit(1);
        Ok(self.load(&query)?.into_iter().next())
    }

    pub fn load_one_with<T: Table, R>(
        &self,
        query: &SelectQuery<T>,
        mapping: impl FnMut(&mut Cursor) -> Option<R>,
    ) -> Result<Option<R>> {
        let query = query.clone().limit(1);
        Ok(self.load_with(&query, mapping)?.into_iter().next())
    }

    /// First column of the first row, e.g. for `SELECT count(*)`-style
    /// selections.
    pub fn load_value<S: FromValue>(&self, query: &impl AsStatement) -> Result<Option<S>> {
        let sql = query.as_statement()?;
        self.with_connection(|conn| {
            debug!(sql = %sql, "querying value");
            let mut stmt = conn.prepare(&sql).map_err(prepare_error)?;
            let mut rows = stmt.query([]).map_err(step_error)?;
            let Some(row) = rows.next().map_err(step_error)? else {
                return Ok(None);
            };
            let value = row.get_ref(0).map(scalar).map_err(step_error)?;
            Ok(value.as_ref().and_then(S::from_value))
        })
    }

    /// Inserts `entities` in one transaction, creating the table first if
    /// needed. `replace` selects `INSERT OR REPLACE` over `INSERT OR IGNORE`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Transaction`] if any row fails; none of the
    /// rows are kept.
    pub fn insert<T: Table>(&self, entities: &[T::Entity], replace: bool) -> Result<()> {
        self.create_table_if_not_exists::<T>()?;
        let policy = if replace {
            ConflictPolicy::Replace
        } else {
            ConflictPolicy::Ignore
        };
        self.with_connection(|conn| {
            let tx = conn.unchecked_transaction().map_err(transaction_error)?;
            for entity in entities {
                execute_statement(&tx, &T::insert_statement(entity, policy)).map_err(
                    |e| match e {
                        SqliteError::Prepare(message) | SqliteError::Step(message) => {
                            SqliteError::Transaction(message)
                        }
                        other => other,
                    },
                )?;
            }
            tx.commit().map_err(transaction_error)
        })
    }

    pub fn insert_one<T: Table>(&self, entity: &T::Entity, replace: bool) -> Result<()> {
        self.insert::<T>(std::slice::from_ref(entity), replace)
    }

    /// Runs an update and returns the number of changed rows.
    pub fn update<T: Table>(&self, query: &UpdateQuery<T>) -> Result<usize> {
        let sql = query.as_statement()?;
        self.create_table_if_not_exists::<T>()?;
        self.with_connection(|conn| execute_statement(conn, &sql))
    }

    /// Runs a delete and returns the number of removed rows.
    pub fn delete<T: Table>(&self, query: &DeleteQuery<T>) -> Result<usize> {
        let sql = query.as_statement()?;
        self.with_connection(|conn| execute_statement(conn, &sql))
    }

    /// Runs a multi-statement script between `BEGIN` and `COMMIT`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Transaction`] if any statement fails; nothing
    /// in the script is applied.
    pub fn execute_transaction(&self, sql: &str) -> Result<()> {
        self.with_connection(|conn| {
            debug!(sql = %sql, "executing transaction");
            let tx = conn.unchecked_transaction().map_err(transaction_error)?;
            tx.execute_batch(sql).map_err(transaction_error)?;
            tx.commit().map_err(transaction_error)
        })
    }
}

#[cfg(test)]
mod tests {
    use sqlservice_core::{ColumnAttribute, ColumnDecl, DataKind, TableColumn};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum NoteColumn {
        Id,
        Body,
    }

    impl TableColumn for NoteColumn {
        const ALL: &'static [Self] = &[NoteColumn::Id, NoteColumn::Body];

        fn name(&self) -> &'static str {
            match self {
                NoteColumn::Id => "id",
                NoteColumn::Body => "body",
            }
        }

        fn declaration(&self) -> ColumnDecl {
            match self {
                NoteColumn::Id => ColumnDecl::new("id", DataKind::Integer).with_attribute(
                    ColumnAttribute::PrimaryKey {
                        auto_increment: false,
                    },
                ),
                NoteColumn::Body => ColumnDecl::new("body", DataKind::Text),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: i64,
        body: String,
    }

    impl RowValue for Note {
        fn decode(cursor: &mut Cursor) -> sqlservice_core::Result<Self> {
            Ok(Note {
                id: cursor.require()?,
                body: cursor.require()?,
            })
        }
    }

    struct Notes;

    impl Table for Notes {
        type Column = NoteColumn;
        type Entity = Note;
        const NAME: &'static str = "notes";

        fn scalar(note: &Note, column: NoteColumn) -> Option<Value> {
            match column {
                NoteColumn::Id => Some(note.id.into()),
                NoteColumn::Body => Some(note.body.as_str().into()),
            }
        }
    }

    fn note(id: i64, body: &str) -> Note {
        Note {
            id,
            body: body.to_string(),
        }
    }

    fn open() -> Database {
        let db = Database::new();
        db.open_in_memory().unwrap();
        db
    }

    #[test]
    fn test_operations_require_open_connection() {
        let db = Database::new();
        assert!(!db.is_open());
        assert!(matches!(db.user_version(), Err(SqliteError::NotOpen)));
        assert!(matches!(db.close(), Err(SqliteError::Close(_))));
    }

    #[test]
    fn test_open_and_close() {
        let db = open();
        assert!(db.is_open());
        db.close().unwrap();
        assert!(!db.is_open());
    }

    #[test]
    fn test_user_version_round_trip() {
        let db = open();
        assert_eq!(db.user_version().unwrap(), 0);
        db.update_user_version(7).unwrap();
        assert_eq!(db.user_version().unwrap(), 7);
    }

    #[test]
    fn test_in_memory_journal_mode_stays_memory() {
        let db = open();
        assert_eq!(db.journal_mode().unwrap(), JournalMode::Memory);
        assert_eq!(
            db.update_journal_mode(JournalMode::Wal).unwrap(),
            JournalMode::Memory
        );
    }

    #[test]
    fn test_load_creates_table_and_returns_empty() {
        let db = open();
        assert!(db.load(&Notes::select_all()).unwrap().is_empty());
    }

    #[test]
    fn test_insert_load_update_delete() {
        let db = open();
        db.insert::<Notes>(&[note(1, "a"), note(2, "b"), note(3, "c")], true)
            .unwrap();

        let second = db
            .load_one(&Notes::select_all().filter(NoteColumn::Id.eq(2)))
            .unwrap();
        assert_eq!(second, Some(note(2, "b")));

        let changed = db
            .update(&Notes::update([NoteColumn::Body.eq("z")]).filter(NoteColumn::Id.gte(2)))
            .unwrap();
        assert_eq!(changed, 2);

        let removed = db
            .delete(&Notes::delete().filter(NoteColumn::Id.eq(1)))
            .unwrap();
        assert_eq!(removed, 1);

        let rest = db
            .load(&Notes::select_all().order_by(NoteColumn::Id, true))
            .unwrap();
        assert_eq!(rest, vec![note(2, "z"), note(3, "z")]);
    }

    #[test]
    fn test_insert_conflict_policy() {
        let db = open();
        db.insert_one::<Notes>(&note(1, "first"), true).unwrap();
        db.insert_one::<Notes>(&note(1, "ignored"), false).unwrap();
        assert_eq!(
            db.load(&Notes::select_all()).unwrap(),
            vec![note(1, "first")]
        );
        db.insert_one::<Notes>(&note(1, "replaced"), true).unwrap();
        assert_eq!(
            db.load(&Notes::select_all()).unwrap(),
            vec![note(1, "replaced")]
        );
    }

    #[test]
    fn test_failed_insert_rolls_back_every_row() {
        let db = open();
        db.create_table_if_not_exists::<Notes>().unwrap();
        db.execute(
            "CREATE TRIGGER reject_two BEFORE INSERT ON notes WHEN NEW.id = 2 \
             BEGIN SELECT RAISE(ABORT, 'id 2 rejected'); END;",
        )
        .unwrap();

        let result = db.insert::<Notes>(&[note(1, "a"), note(2, "b"), note(3, "c")], true);
        assert!(matches!(result, Err(SqliteError::Transaction(_))));
        assert!(db.load(&Notes::select_all()).unwrap().is_empty());
    }

    #[test]
    fn test_update_without_assignments_fails_before_prepare() {
        let db = open();
        let update = Notes::update([NoteColumn::Id.gt(1)]);
        assert!(matches!(
            db.update(&update),
            Err(SqliteError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_load_with_mapping_and_value() {
        let db = open();
        db.insert::<Notes>(&[note(1, "a"), note(2, "b")], true).unwrap();

        let bodies = db
            .load_with(&Notes::select_some(&[NoteColumn::Body]), |cursor| {
                cursor.next::<String>()
            })
            .unwrap();
        assert_eq!(bodies, vec!["a".to_string(), "b".to_string()]);

        let max_id: Option<i64> = db
            .load_value(&Notes::select_some(&[NoteColumn::Id]).order_by(NoteColumn::Id, false))
            .unwrap();
        assert_eq!(max_id, Some(2));
    }

    #[test]
    fn test_strict_load_aborts_and_lenient_load_skips() {
        let db = open();
        db.create_table_if_not_exists::<Notes>().unwrap();
        db.execute("INSERT INTO notes (id, body) VALUES (1, 'ok'), (2, NULL);")
            .unwrap();

        assert!(matches!(
            db.load(&Notes::select_all()),
            Err(SqliteError::Step(_))
        ));
        assert_eq!(
            db.load_lenient(&Notes::select_all()).unwrap(),
            vec![note(1, "ok")]
        );
    }

    #[test]
    fn test_invalid_operand_fails_before_prepare() {
        let db = open();
        let query = Notes::select_all().filter(sqlservice_core::Condition::new(
            "id",
            sqlservice_core::Operator::In,
            1,
        ));
        assert!(matches!(
            db.load(&query),
            Err(SqliteError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_bad_sql_is_a_prepare_error() {
        let db = open();
        assert!(matches!(
            db.load_rows::<i64>(&sqlservice_core::SelectStatement::new(
                "missing_table",
                sqlservice_core::Selection::All
            )),
            Err(SqliteError::Prepare(_))
        ));
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let db = open();
        db.create_table_if_not_exists::<Notes>().unwrap();
        let result = db.execute_transaction(
            "INSERT INTO notes (id, body) VALUES (1, 'a');\n\
             INSERT INTO no_such_table VALUES (1);",
        );
        assert!(matches!(result, Err(SqliteError::Transaction(_))));
        assert!(db.load(&Notes::select_all()).unwrap().is_empty());
    }

    #[test]
    fn test_drop_table() {
        let db = open();
        db.insert_one::<Notes>(&note(1, "a"), true).unwrap();
        db.drop_table::<Notes>().unwrap();
        assert!(db.load(&Notes::select_all()).unwrap().is_empty());
    }
}
