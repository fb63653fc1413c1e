//! Shared pieces of the demo binaries: the `users` table and logging setup.

use sqlservice_core::{
    ColumnAttribute, ColumnDecl, Cursor, DataKind, RowValue, Table, TableColumn, Value,
};
use tracing_subscriber::EnvFilter;

/// Installs a compact `fmt` subscriber; `RUST_LOG` overrides the default
/// filter.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("sqlservice_sqlite=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserColumn {
    UserId,
    Name,
    Age,
    Nickname,
}

impl TableColumn for UserColumn {
    const ALL: &'static [Self] = &[
        UserColumn::UserId,
        UserColumn::Name,
        UserColumn::Age,
        UserColumn::Nickname,
    ];

    fn name(&self) -> &'static str {
        match self {
            UserColumn::UserId => "userID",
            UserColumn::Name => "name",
            UserColumn::Age => "age",
            UserColumn::Nickname => "nickname",
        }
    }

    fn declaration(&self) -> ColumnDecl {
        match self {
            UserColumn::UserId => ColumnDecl::new("userID", DataKind::Integer).with_attribute(
                ColumnAttribute::PrimaryKey {
                    auto_increment: false,
                },
            ),
            UserColumn::Name => {
                ColumnDecl::new("name", DataKind::Text).with_attribute(ColumnAttribute::NotNull)
            }
            UserColumn::Age => ColumnDecl::new("age", DataKind::Integer),
            UserColumn::Nickname => ColumnDecl::new("nickname", DataKind::Text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub nickname: Option<String>,
}

impl RowValue for User {
    fn decode(cursor: &mut Cursor) -> sqlservice_core::Result<Self> {
        Ok(User {
            user_id: cursor.require()?,
            name: cursor.require()?,
            age: cursor.next(),
            nickname: cursor.next(),
        })
    }
}

pub struct Users;

impl Table for Users {
    type Column = UserColumn;
    type Entity = User;
    const NAME: &'static str = "users";

    fn scalar(user: &User, column: UserColumn) -> Option<Value> {
        match column {
            UserColumn::UserId => Some(user.user_id.into()),
            UserColumn::Name => Some(user.name.as_str().into()),
            UserColumn::Age => user.age.map(Value::from),
            UserColumn::Nickname => user.nickname.as_deref().map(Value::from),
        }
    }

    fn migrate_statement(version: i32) -> Option<String> {
        match version {
            0 => Some(
                "CREATE TABLE IF NOT EXISTS users (userID INTEGER PRIMARY KEY, name TEXT NOT NULL);"
                    .to_string(),
            ),
            1 => Some(Self::add_column_statement(UserColumn::Age)),
            2 => Some(Self::add_column_statement(UserColumn::Nickname)),
            _ => None,
        }
    }
}

/// `count` sample users with ids starting at 1.
pub fn sample_users(count: i64) -> Vec<User> {
    (1..=count)
        .map(|id| User {
            user_id: id,
            name: format!("user{id}"),
            age: Some(18 + id * 3),
            nickname: None,
        })
        .collect()
}
