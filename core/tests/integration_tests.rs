//! Integration tests for the sqlservice-core crate.

use pretty_assertions::assert_eq;
use sqlservice_core::{
    AsStatement, ColumnAttribute, ColumnDecl, Condition, ConditionSet, ConflictPolicy, Cursor,
    DataKind, Operator, QueryError, RowValue, Table, TableColumn, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table1Column {
    K1,
    K2,
    K3,
}

impl TableColumn for Table1Column {
    const ALL: &'static [Self] = &[Table1Column::K1, Table1Column::K2, Table1Column::K3];

    fn name(&self) -> &'static str {
        match self {
            Table1Column::K1 => "k1",
            Table1Column::K2 => "k2",
            Table1Column::K3 => "k3",
        }
    }

    fn declaration(&self) -> ColumnDecl {
        match self {
            Table1Column::K1 => ColumnDecl::new("k1", DataKind::Integer).with_attribute(
                ColumnAttribute::PrimaryKey {
                    auto_increment: false,
                },
            ),
            Table1Column::K2 => ColumnDecl::new("k2", DataKind::Integer),
            Table1Column::K3 => ColumnDecl::new("k3", DataKind::Text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Row1 {
    k1: i64,
    k2: i64,
    k3: Option<String>,
}

impl RowValue for Row1 {
    fn decode(cursor: &mut Cursor) -> sqlservice_core::Result<Self> {
        Ok(Row1 {
            k1: cursor.require()?,
            k2: cursor.require()?,
            k3: cursor.next(),
        })
    }
}

struct Table1;

impl Table for Table1 {
    type Column = Table1Column;
    type Entity = Row1;
    const NAME: &'static str = "Table1";

    fn scalar(entity: &Row1, column: Table1Column) -> Option<Value> {
        match column {
            Table1Column::K1 => Some(entity.k1.into()),
            Table1Column::K2 => Some(entity.k2.into()),
            Table1Column::K3 => entity.k3.as_deref().map(Value::from),
        }
    }

    fn migrate_statement(version: i32) -> Option<String> {
        (version == 1).then(|| "ALTER TABLE Table1 ADD COLUMN k4 INTEGER;".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table2Column {
    C1,
    C2,
}

impl TableColumn for Table2Column {
    const ALL: &'static [Self] = &[Table2Column::C1, Table2Column::C2];

    fn name(&self) -> &'static str {
        match self {
            Table2Column::C1 => "c1",
            Table2Column::C2 => "c2",
        }
    }

    fn declaration(&self) -> ColumnDecl {
        let pk = ColumnAttribute::PrimaryKey {
            auto_increment: false,
        };
        match self {
            Table2Column::C1 => ColumnDecl::new("c1", DataKind::Char(8)).with_attribute(pk),
            Table2Column::C2 => ColumnDecl::new("c2", DataKind::Integer).with_attribute(pk),
        }
    }
}

struct Row2 {
    c1: String,
    c2: i64,
}

impl RowValue for Row2 {
    fn decode(cursor: &mut Cursor) -> sqlservice_core::Result<Self> {
        Ok(Row2 {
            c1: cursor.require()?,
            c2: cursor.require()?,
        })
    }
}

struct Table2;

impl Table for Table2 {
    type Column = Table2Column;
    type Entity = Row2;
    const NAME: &'static str = "Table2";

    fn scalar(entity: &Row2, column: Table2Column) -> Option<Value> {
        match column {
            Table2Column::C1 => Some(entity.c1.as_str().into()),
            Table2Column::C2 => Some(entity.c2.into()),
        }
    }
}

#[test]
fn test_create_statements() {
    assert_eq!(
        Table1::create_statement(),
        "CREATE TABLE IF NOT EXISTS Table1 (k1 INTEGER PRIMARY KEY, k2 INTEGER, k3 TEXT);"
    );
    assert_eq!(
        Table2::create_statement(),
        "CREATE TABLE IF NOT EXISTS Table2 (c1 CHAR(8), c2 INTEGER, PRIMARY KEY (c1, c2));"
    );
}

#[test]
fn test_insert_follows_declaration_order() {
    let row = Row1 {
        k1: 1,
        k2: 20,
        k3: None,
    };
    assert_eq!(
        Table1::insert_statement(&row, ConflictPolicy::Replace),
        "INSERT OR REPLACE INTO Table1 (k1, k2, k3) VALUES (1, 20, NULL);"
    );
    assert_eq!(
        Table2::insert_statement(
            &Row2 {
                c1: "a".to_string(),
                c2: 2
            },
            ConflictPolicy::Ignore
        ),
        "INSERT OR IGNORE INTO Table2 (c1, c2) VALUES ('a', 2);"
    );
}

#[test]
fn test_typed_select_update_delete() {
    let base = Table1::select_all();
    let filtered = base
        .clone()
        .filter(Table1Column::K1.eq(1) & Table1Column::K2.gt(2))
        .filter(Table1Column::K3.not_in(vec!["x", "y"]));
    let some = Table1::select_some(&[Table1Column::K2])
        .order_by(Table1Column::K1, false)
        .limit(3);

    assert_eq!(base.as_statement().unwrap(), "SELECT * FROM Table1;");
    assert_eq!(
        filtered.as_statement().unwrap(),
        "SELECT * FROM Table1 WHERE (k1 = 1 AND k2 > 2) AND k3 NOT IN ('x', 'y');"
    );
    assert_eq!(
        some.as_statement().unwrap(),
        "SELECT k2 FROM Table1 ORDER BY k1 DESC LIMIT 3;"
    );

    let update = Table1::update([Table1Column::K3.eq("z"), Table1Column::K2.lt(0)])
        .filter(Table1Column::K1.eq(3));
    assert_eq!(
        update.as_statement().unwrap(),
        "UPDATE Table1 SET k3 = 'z' WHERE k1 = 3;"
    );

    let delete = Table1::delete().filter(Table1Column::K3.is_null() | Table1Column::K3.like("t%"));
    assert_eq!(
        delete.as_statement().unwrap(),
        "DELETE FROM Table1 WHERE k3 IS NULL OR k3 LIKE 't%';"
    );
}

#[test]
fn test_reused_base_query_is_not_mutated() {
    let base = Table1::select_all().filter(Table1Column::K1.gte(1));
    let narrow = base.clone().filter(Table1Column::K2.lte(5));
    let wide = base.clone().filter(ConditionSet::Empty);

    assert_eq!(
        narrow.as_statement().unwrap(),
        "SELECT * FROM Table1 WHERE k1 >= 1 AND k2 <= 5;"
    );
    assert_eq!(wide.as_statement().unwrap(), base.as_statement().unwrap());
}

#[test]
fn test_join_qualifies_each_side() {
    let left = Table1::select_all().filter(Table1Column::K1.eq(1)).limit(10);
    let right = Table2::select_some(&[Table2Column::C1, Table2Column::C2])
        .filter(Table2Column::C2.gt(10));

    let join = left.inner_join(&right, (Table1Column::K1, Table2Column::C2), true);
    assert_eq!(
        join.as_statement().unwrap(),
        "SELECT Table1.*, Table2.c1, Table2.c2 FROM Table1 \
         INNER JOIN Table2 ON Table1.k1 = Table2.c2 \
         WHERE Table1.k1 = 1 AND Table2.c2 > 10 LIMIT 10;"
    );
}

#[test]
fn test_join_preserves_nesting_and_takes_minimum_limit() {
    let left = Table1::select_all()
        .filter(Table1Column::K1.eq(1) | Table1Column::K2.eq(2))
        .order_by(Table1Column::K1, true)
        .limit(10);
    let right = Table2::select_all()
        .filter(Table2Column::C1.eq("a") & Table2Column::C2.eq(3))
        .order_by(Table2Column::C2, false)
        .limit(4);

    let join = left.outer_join(&right, (Table1Column::K2, Table2Column::C2), false);
    assert_eq!(
        join.as_statement().unwrap(),
        "SELECT Table1.*, Table2.* FROM Table1 \
         LEFT OUTER JOIN Table2 ON Table1.k2 = Table2.c2 \
         WHERE (Table1.k1 = 1 OR Table1.k2 = 2) OR (Table2.c1 = 'a' AND Table2.c2 = 3) \
         ORDER BY Table1.k1 ASC, Table2.c2 DESC LIMIT 4;"
    );
}

#[test]
fn test_join_chain_separates_clauses_with_spaces() {
    let left = Table1::select_some(&[Table1Column::K1]);
    let right = Table2::select_some(&[Table2Column::C1]);
    let join = left
        .cross_join(&right, (Table1Column::K1, Table2Column::C2), true)
        .inner_join(&right, (Table1Column::K2, Table2Column::C2), true)
        .limit(1);
    assert_eq!(
        join.as_statement().unwrap(),
        "SELECT Table1.k1, Table2.c1, Table2.c1 FROM Table1 \
         CROSS JOIN Table2 ON Table1.k1 = Table2.c2 \
         INNER JOIN Table2 ON Table1.k2 = Table2.c2 LIMIT 1;"
    );
}

#[test]
fn test_invalid_operand_is_reported_at_compile_time() {
    let query =
        Table1::select_all().filter(Condition::new("k1", Operator::In, Value::Integer(3)));
    assert!(matches!(
        query.as_statement(),
        Err(QueryError::InvalidArgument(_))
    ));
}

#[test]
fn test_migration_statements() {
    assert_eq!(Table1::drop_statement(), "DROP TABLE IF EXISTS Table1;");
    assert_eq!(
        Table1::rename_statement("OldTable1"),
        "ALTER TABLE OldTable1 RENAME TO Table1;"
    );
    assert_eq!(
        Table1::add_column_statement(Table1Column::K3),
        "ALTER TABLE Table1 ADD COLUMN k3 TEXT;"
    );
    assert_eq!(
        Table1::create_statement_as("temp_Table1"),
        "CREATE TABLE IF NOT EXISTS temp_Table1 (k1 INTEGER PRIMARY KEY, k2 INTEGER, k3 TEXT);"
    );
    assert_eq!(
        Table1::modify_columns_statement(None, &["k1", "k2"], &["k1", "old_k2"]),
        "INSERT INTO temp_Table1 (k1, k2) SELECT k1, old_k2 FROM Table1;\n\
         DROP TABLE IF EXISTS Table1;\n\
         ALTER TABLE temp_Table1 RENAME TO Table1;"
    );
    assert_eq!(Table1::migrate_statement(0), None);
    assert!(Table1::migrate_statement(1).is_some());
}

#[test]
fn test_row_codec_decodes_in_column_order() {
    let mut cursor = Cursor::new(
        Table1::column_names().into_iter().map(String::from).collect(),
        vec![Some(Value::Integer(4)), Some(Value::Integer(40)), None],
    );
    let row = Row1::decode(&mut cursor).unwrap();
    assert_eq!(
        row,
        Row1 {
            k1: 4,
            k2: 40,
            k3: None
        }
    );
    assert_eq!(cursor.column::<i64, _>(Table1Column::K2), Some(40));
}

#[test]
fn test_query_values_serialize() {
    let set = Table1Column::K1.eq(1) | Table1Column::K2.is_in(vec![1, 2]);
    let json = serde_json::to_string(&set).unwrap();
    let back: ConditionSet = serde_json::from_str(&json).unwrap();
    assert_eq!(back, set);
}
