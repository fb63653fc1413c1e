//! Walks the `users` table through three schema versions while other jobs
//! keep running.
//!
//! Usage: `migration [CONFIG]` where CONFIG is a YAML or JSON engine
//! configuration. Without one, a database in the temp directory is used.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::mpsc;

use sqlservice_core::Table;
use sqlservice_demos::{Users, init_logging, sample_users};
use sqlservice_sqlite::{Engine, EngineConfig, JournalMode, Migration, Result, SqliteError};
use tracing::{error, info};

const TARGET_VERSION: i32 = 3;

fn main() -> ExitCode {
    init_logging(std::env::var_os("VERBOSE").is_some());
    match run(std::env::args().nth(1).map(PathBuf::from)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "migration demo failed");
            ExitCode::FAILURE
        }
    }
}

fn config(path: Option<PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path),
        None => Ok(
            EngineConfig::new(std::env::temp_dir().join("sqlservice-demo.db"))
                .with_journal_mode(JournalMode::Wal),
        ),
    }
}

fn run(config_path: Option<PathBuf>) -> Result<()> {
    let config = config(config_path)?;
    info!(path = %config.path.display(), "opening database");
    let engine = Arc::new(Engine::with_config(&config)?);

    let before = engine.run(|db| db.user_version())?;
    info!(version = before, "schema version before migration");

    engine.run_async(
        |db| db.user_version(),
        |version| info!(?version, "job queued before the migration"),
    );

    let (done, finished) = mpsc::channel();
    let seeding = Arc::clone(&engine);
    let migration = Migration::table::<Users>(TARGET_VERSION).with_finalize(move |version, _| {
        // Still inside the barrier; nested jobs run inline.
        let seeded = seeding.run(|db| db.insert::<Users>(&sample_users(5), true));
        info!(version, ok = seeded.is_ok(), "seeded users after migration");
    });
    engine.migrate(migration, move |result| {
        let _ = done.send(result);
    });

    let rows = engine.run(|db| db.load(&Users::select_all()))?;
    info!(rows = rows.len(), "job queued after the migration");

    let version = finished
        .recv()
        .map_err(|_| SqliteError::Disconnected)??;
    info!(version, "migration complete");
    Ok(())
}
