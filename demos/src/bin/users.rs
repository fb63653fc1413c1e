//! Inserts, queries, updates and deletes rows of the `users` table.
//!
//! Usage: `users [DB_PATH]` (in-memory when no path is given).

use std::process::ExitCode;

use sqlservice_core::{Table, TableColumn};
use sqlservice_demos::{UserColumn, Users, init_logging, sample_users};
use sqlservice_sqlite::{Engine, Result};
use tracing::{error, info};

fn main() -> ExitCode {
    init_logging(std::env::var_os("VERBOSE").is_some());
    match run(std::env::args().nth(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "users demo failed");
            ExitCode::FAILURE
        }
    }
}

fn run(path: Option<String>) -> Result<()> {
    let engine = Engine::new()?;
    match path {
        Some(path) => engine.open(path)?,
        None => engine.open_in_memory()?,
    }

    let users = sample_users(10);
    engine.run(move |db| db.insert::<Users>(&users, true))?;

    let third = Users::select_all().filter(UserColumn::UserId.eq(3));
    let found = engine.run(move |db| db.load_one(&third))?;
    info!(user = ?found, "loaded user 3");

    let rename = Users::update([UserColumn::Nickname.eq("x")]).filter(UserColumn::UserId.eq(3));
    let changed = engine.run(move |db| db.update(&rename))?;
    info!(changed, "updated nickname");

    let picked = Users::select_some(&[UserColumn::Name])
        .filter(UserColumn::Age.gte(30) | UserColumn::Nickname.eq("x"))
        .order_by(UserColumn::Age, false)
        .limit(3);
    let names = engine.run(move |db| db.load_with(&picked, |cursor| cursor.next::<String>()))?;
    info!(?names, "oldest users or nicknamed x");

    let delete = Users::delete().filter(UserColumn::UserId.eq(3));
    let removed = engine.run(move |db| db.delete(&delete))?;
    let remaining = engine.run(|db| db.load(&Users::select_all()))?;
    info!(removed, remaining = remaining.len(), "deleted user 3");
    Ok(())
}
