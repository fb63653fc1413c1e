//! SQLite execution engine for `sqlservice-core` queries.
//!
//! This crate runs typed queries against a single SQLite connection with a
//! strict concurrency discipline: all access is serialized on one worker
//! lane, and schema migrations act as exclusive barriers on that lane.
//!
//! # Architecture
//!
//! - **`database`**: [`Database`], the connection handle jobs receive, with
//!   typed load/insert/update/delete, pragmas and transactions
//! - **`migration`**: [`Migration`], the iterative version stepper
//! - **`engine`**: [`Engine`], the access and migration lanes
//! - **`config`**: [`EngineConfig`], loadable from YAML or JSON
//!
//! # Quick start
//!
//! ```no_run
//! use sqlservice_sqlite::{Engine, EngineConfig, JournalMode};
//!
//! let config = EngineConfig::new("app.db").with_journal_mode(JournalMode::Wal);
//! let engine = Engine::with_config(&config).unwrap();
//!
//! let version = engine.run(|db| db.user_version()).unwrap();
//! println!("schema version {version}");
//! ```
//!
//! Jobs must be `'static`: move owned queries into the closure, and share
//! the engine itself with `Arc` when a job needs to call back into it.

mod config;
mod database;
mod engine;
mod error;
mod migration;

pub use config::{EngineConfig, JournalMode};
pub use database::Database;
pub use engine::Engine;
pub use error::{Result, SqliteError};
pub use migration::Migration;
