//! Schema and insert statement generation.
//!
//! These are the primitives migration steps are built from. SQLite's
//! `ALTER TABLE` cannot drop or rename columns portably, so
//! [`copy_and_rename`] expresses those changes as copy, drop and rename.

use crate::column::ColumnDecl;
use crate::value::{Value, literal};

/// Conflict policy of an `INSERT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    #[default]
    Replace,
    Ignore,
}

impl ConflictPolicy {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ConflictPolicy::Replace => "REPLACE",
            ConflictPolicy::Ignore => "IGNORE",
        }
    }
}

/// `CREATE TABLE IF NOT EXISTS {table} ({decl, ..}[, PRIMARY KEY (..)]);`
///
/// The composite `PRIMARY KEY (..)` constraint is used exactly when more
/// than one column is a primary key; otherwise the key stays inline.
pub fn create_table(table: &str, columns: &[ColumnDecl]) -> String {
    let primary_keys: Vec<&str> = columns
        .iter()
        .filter(|c| c.is_primary_key())
        .map(|c| c.name.as_str())
        .collect();
    let composite = primary_keys.len() > 1;

    let mut parts: Vec<String> = columns.iter().map(|c| c.to_sql(!composite)).collect();
    if composite {
        parts.push(format!("PRIMARY KEY ({})", primary_keys.join(", ")));
    }
    format!("CREATE TABLE IF NOT EXISTS {table} ({});", parts.join(", "))
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {table};")
}

pub fn rename_table(old: &str, new: &str) -> String {
    format!("ALTER TABLE {old} RENAME TO {new};")
}

pub fn add_column(table: &str, column: &ColumnDecl) -> String {
    format!("ALTER TABLE {table} ADD COLUMN {};", column.to_sql(true))
}

/// Copies rows from `table` into `temp`, drops `table` and renames `temp`
/// back to `table`.
///
/// `new_columns[i]` in `temp` receives `old_columns[i]` from `table`. The
/// temp table must already exist with the new layout. The three statements
/// are newline-separated and meant to run as one transaction.
pub fn copy_and_rename(
    table: &str,
    temp: &str,
    new_columns: &[&str],
    old_columns: &[&str],
) -> String {
    let copy = format!(
        "INSERT INTO {temp} ({}) SELECT {} FROM {table};",
        new_columns.join(", "),
        old_columns.join(", ")
    );
    [copy, drop_table(table), rename_table(temp, table)].join("\n")
}

/// `INSERT OR {REPLACE|IGNORE} INTO {table} ({cols}) VALUES ({vals});`
pub fn insert(
    table: &str,
    columns: &[&str],
    values: &[Option<Value>],
    policy: ConflictPolicy,
) -> String {
    let values: Vec<String> = values.iter().map(|v| literal(v.as_ref())).collect();
    format!(
        "INSERT OR {} INTO {table} ({}) VALUES ({});",
        policy.as_sql(),
        columns.join(", "),
        values.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::column::{ColumnAttribute, DataKind};

    fn pk(name: &str) -> ColumnDecl {
        ColumnDecl::new(name, DataKind::Integer).with_attribute(ColumnAttribute::PrimaryKey {
            auto_increment: false,
        })
    }

    #[test]
    fn test_create_with_single_primary_key_inlines_it() {
        let columns = [
            pk("userID"),
            ColumnDecl::new("name", DataKind::Text).with_attribute(ColumnAttribute::NotNull),
            ColumnDecl::new("age", DataKind::Integer),
        ];
        assert_eq!(
            create_table("users", &columns),
            "CREATE TABLE IF NOT EXISTS users (userID INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER);"
        );
    }

    #[test]
    fn test_create_with_multiple_primary_keys_uses_table_constraint() {
        let columns = [pk("a"), pk("b"), ColumnDecl::new("c", DataKind::Real)];
        assert_eq!(
            create_table("pairs", &columns),
            "CREATE TABLE IF NOT EXISTS pairs (a INTEGER, b INTEGER, c REAL, PRIMARY KEY (a, b));"
        );
    }

    #[test]
    fn test_migration_primitives() {
        assert_eq!(drop_table("t"), "DROP TABLE IF EXISTS t;");
        assert_eq!(rename_table("old", "new"), "ALTER TABLE old RENAME TO new;");
        assert_eq!(
            add_column("t", &ColumnDecl::new("nick", DataKind::Text)),
            "ALTER TABLE t ADD COLUMN nick TEXT;"
        );
        assert_eq!(
            copy_and_rename("users", "temp_users", &["id", "name"], &["id", "old_name"]),
            "INSERT INTO temp_users (id, name) SELECT id, old_name FROM users;\n\
             DROP TABLE IF EXISTS users;\n\
             ALTER TABLE temp_users RENAME TO users;"
        );
    }

    #[test]
    fn test_insert_renders_values_in_column_order() {
        let sql = insert(
            "users",
            &["id", "name", "age"],
            &[Some(Value::from(1)), Some(Value::from("it's")), None],
            ConflictPolicy::Ignore,
        );
        assert_eq!(
            sql,
            "INSERT OR IGNORE INTO users (id, name, age) VALUES (1, 'it''s', NULL);"
        );
    }
}
