//! The execution engine: serialized access to one connection, fenced by
//! migrations.
//!
//! An [`Engine`] owns a single [`Database`] and two named worker threads:
//!
//! - the **access lane** runs every job in enqueue order, one at a time;
//! - the **migration lane** runs migrations, each under an exclusive
//!   barrier.
//!
//! Requesting a migration takes a ticket from the barrier and posts a fence
//! on the access lane. Jobs queued before the request finish first; when the
//! access lane reaches the fence it hands the connection to the migration
//! lane and holds until that ticket has left the barrier. Jobs queued after
//! the request therefore observe the migrated schema.
//!
//! A job that calls back into its own engine (a nested [`Engine::run`], or a
//! migration step that runs queries) executes inline: the lanes record the
//! engine in a thread-local set while they run user code, and the
//! connection sits behind a reentrant lock.
//!
//! Panics in user code are caught on both lanes. A panicking job reports
//! [`SqliteError::Panicked`]; a panicking migration reports
//! [`SqliteError::Migration`] and still releases the barrier.
//!
//! # Example
//!
//! ```no_run
//! use sqlservice_sqlite::{Engine, Migration};
//!
//! let engine = Engine::new().unwrap();
//! engine.open("app.db").unwrap();
//!
//! let version = engine
//!     .migrate_blocking(Migration::new(1, |_, db| {
//!         db.execute("CREATE TABLE IF NOT EXISTS kv (k TEXT PRIMARY KEY, v TEXT);")
//!     }))
//!     .unwrap();
//! assert_eq!(version, 1);
//!
//! engine.run_async(
//!     |db| db.execute("INSERT INTO kv (k, v) VALUES ('a', '1');"),
//!     |result| assert!(result.is_ok()),
//! );
//! assert_eq!(engine.run(|db| db.user_version()).unwrap(), 1);
//! ```

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::{Condvar, Mutex, ReentrantMutex};
use tracing::{debug, warn};

use crate::config::{DEFAULT_ACCESS_LANE, DEFAULT_MIGRATION_LANE, EngineConfig};
use crate::database::Database;
use crate::error::{Result, SqliteError};
use crate::migration::Migration;

type Job = Box<dyn FnOnce(Result<&Database>) + Send>;
type Completion = Box<dyn FnOnce(Result<i32>) + Send>;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ACTIVE_ENGINES: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Marks the current thread as running user code inside an engine's
/// exclusive section.
struct ActiveSection {
    engine: u64,
}

impl ActiveSection {
    fn enter(engine: u64) -> Self {
        ACTIVE_ENGINES.with(|active| active.borrow_mut().push(engine));
        Self { engine }
    }

    fn contains(engine: u64) -> bool {
        ACTIVE_ENGINES.with(|active| active.borrow().contains(&engine))
    }
}

impl Drop for ActiveSection {
    fn drop(&mut self) {
        ACTIVE_ENGINES.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(index) = active.iter().rposition(|id| *id == self.engine) {
                active.remove(index);
            }
        });
    }
}

#[derive(Debug, Default)]
struct BarrierState {
    entered: u64,
    left: u64,
}

/// Counting barrier between the migration lane and the access lane.
///
/// Tickets are issued in submission order and leave in the same order, so
/// waiting for `left >= ticket` releases the access lane exactly when the
/// migration it fenced for is done.
#[derive(Debug, Default)]
struct MigrationBarrier {
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl MigrationBarrier {
    fn enter(&self) -> u64 {
        let mut state = self.state.lock();
        state.entered += 1;
        state.entered
    }

    fn leave(&self, ticket: u64) {
        let mut state = self.state.lock();
        state.left = state.left.max(ticket);
        self.released.notify_all();
    }

    fn wait_for(&self, ticket: u64) {
        let mut state = self.state.lock();
        while state.left < ticket {
            self.released.wait(&mut state);
        }
    }

    fn pending(&self) -> u64 {
        let state = self.state.lock();
        state.entered - state.left
    }
}

/// Leaves the barrier for `ticket` when dropped, so an unwinding
/// migration still releases the access lane.
struct LeaveOnDrop<'a> {
    barrier: &'a MigrationBarrier,
    ticket: u64,
}

impl Drop for LeaveOnDrop<'_> {
    fn drop(&mut self) {
        self.barrier.leave(self.ticket);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs a job, turning a panic into [`SqliteError::Panicked`].
fn guarded<R>(job: impl FnOnce() -> Result<R>) -> Result<R> {
    panic::catch_unwind(AssertUnwindSafe(job))
        .unwrap_or_else(|payload| Err(SqliteError::Panicked(panic_message(&*payload))))
}

/// Runs a migration, turning a panicking step or finalizer into
/// [`SqliteError::Migration`].
fn run_migration(migration: Migration, db: &Database) -> Result<i32> {
    panic::catch_unwind(AssertUnwindSafe(|| migration.run(db))).unwrap_or_else(|payload| {
        let message = panic_message(&*payload);
        warn!(error = %message, "migration panicked");
        Err(SqliteError::Migration(format!("migration panicked: {message}")))
    })
}

enum AccessMessage {
    Job(Job),
    Fence {
        ticket: u64,
        reached: mpsc::Sender<()>,
    },
    Shutdown,
}

struct MigrationTask {
    ticket: u64,
    reached: mpsc::Receiver<()>,
    migration: Migration,
    completion: Completion,
}

enum MigrationMessage {
    Task(MigrationTask),
    Shutdown,
}

struct Shared {
    id: u64,
    db: ReentrantMutex<Database>,
    barrier: MigrationBarrier,
}

fn run_access_lane(shared: &Shared, messages: mpsc::Receiver<AccessMessage>) {
    for message in messages {
        match message {
            AccessMessage::Job(job) => {
                debug!(engine = shared.id, "dequeued job");
                let _active = ActiveSection::enter(shared.id);
                let db = shared.db.lock();
                // Completions run here too; a panic in one must not end the lane.
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job(Ok(&*db)))) {
                    warn!(
                        engine = shared.id,
                        error = %panic_message(&*payload),
                        "job panicked on the access lane"
                    );
                }
            }
            AccessMessage::Fence { ticket, reached } => {
                debug!(engine = shared.id, ticket, "access lane reached migration fence");
                // The migration lane may already be gone during shutdown.
                let _ = reached.send(());
                shared.barrier.wait_for(ticket);
                debug!(engine = shared.id, ticket, "access lane released");
            }
            AccessMessage::Shutdown => break,
        }
    }
}

fn run_migration_lane(shared: &Shared, messages: mpsc::Receiver<MigrationMessage>) {
    for message in messages {
        let MigrationMessage::Task(task) = message else {
            break;
        };
        let result = {
            let _leave = LeaveOnDrop {
                barrier: &shared.barrier,
                ticket: task.ticket,
            };
            match task.reached.recv() {
                Ok(()) => {
                    let _active = ActiveSection::enter(shared.id);
                    let db = shared.db.lock();
                    run_migration(task.migration, &db)
                }
                Err(_) => Err(SqliteError::Disconnected),
            }
        };
        debug!(engine = shared.id, ticket = task.ticket, "migration barrier left");
        let completion = task.completion;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| completion(result))) {
            warn!(
                engine = shared.id,
                error = %panic_message(&*payload),
                "migration completion panicked"
            );
        }
    }
}

/// Serialized, migration-aware access to one SQLite connection.
///
/// `Engine` is `Send + Sync`; share it with `Arc` to call it from several
/// threads. Dropping it drains both lanes and joins their threads.
pub struct Engine {
    shared: Arc<Shared>,
    access: mpsc::Sender<AccessMessage>,
    migrations: mpsc::Sender<MigrationMessage>,
    submit: Mutex<()>,
    migration_lane: ThreadId,
    lanes: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Starts an engine with default lane names and no open connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Io`] if a lane thread cannot be spawned.
    pub fn new() -> Result<Self> {
        Self::spawn(DEFAULT_ACCESS_LANE, DEFAULT_MIGRATION_LANE)
    }

    /// Starts an engine from `config`, opens its database and applies the
    /// configured journal mode.
    pub fn with_config(config: &EngineConfig) -> Result<Self> {
        let engine = Self::spawn(&config.access_lane_name, &config.migration_lane_name)?;
        if config.read_only {
            engine.open_read_only(&config.path)?;
        } else {
            engine.open(&config.path)?;
        }
        if let Some(mode) = config.journal_mode {
            let applied = engine.run(move |db| db.update_journal_mode(mode))?;
            if applied != mode {
                warn!(requested = %mode, applied = %applied, "journal mode was not applied");
            }
        }
        Ok(engine)
    }

    fn spawn(access_lane_name: &str, migration_lane_name: &str) -> Result<Self> {
        let shared = Arc::new(Shared {
            id: NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed),
            db: ReentrantMutex::new(Database::new()),
            barrier: MigrationBarrier::default(),
        });
        let (access, access_rx) = mpsc::channel();
        let (migrations, migration_rx) = mpsc::channel();

        let access_lane = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(access_lane_name.to_string())
                .spawn(move || run_access_lane(&shared, access_rx))?
        };
        let migration_lane = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(migration_lane_name.to_string())
                .spawn(move || run_migration_lane(&shared, migration_rx))?
        };
        debug!(
            engine = shared.id,
            access_lane = access_lane_name,
            migration_lane = migration_lane_name,
            "engine started"
        );

        Ok(Self {
            shared,
            access,
            migrations,
            submit: Mutex::new(()),
            migration_lane: migration_lane.thread().id(),
            lanes: vec![access_lane, migration_lane],
        })
    }

    fn is_active_here(&self) -> bool {
        ActiveSection::contains(self.shared.id)
    }

    fn enqueue(&self, job: Job) {
        debug!(engine = self.shared.id, "enqueued job");
        if let Err(mpsc::SendError(AccessMessage::Job(job))) =
            self.access.send(AccessMessage::Job(job))
        {
            job(Err(SqliteError::Disconnected));
        }
    }

    /// Runs `job` with exclusive access to the database and blocks until it
    /// finishes.
    ///
    /// Called from inside a job or migration step of this engine, the job
    /// runs inline instead of being queued.
    ///
    /// # Errors
    ///
    /// Returns the job's own error, [`SqliteError::Panicked`] if the job
    /// panicked, or [`SqliteError::Disconnected`] if the access lane has
    /// shut down.
    pub fn run<R, F>(&self, job: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&Database) -> Result<R> + Send + 'static,
    {
        if self.is_active_here() {
            debug!(engine = self.shared.id, "running nested job inline");
            let db = self.shared.db.lock();
            return guarded(|| job(&db));
        }
        let (reply, result) = mpsc::channel();
        self.enqueue(Box::new(move |db: Result<&Database>| {
            let _ = reply.send(db.and_then(|db| guarded(|| job(db))));
        }));
        result.recv().map_err(|_| SqliteError::Disconnected)?
    }

    /// Queues `job` and returns immediately; `completion` receives its result
    /// on the access lane.
    ///
    /// If the access lane has shut down, `completion` is called on the
    /// caller's thread with [`SqliteError::Disconnected`].
    pub fn run_async<R, F, C>(&self, job: F, completion: C)
    where
        R: Send + 'static,
        F: FnOnce(&Database) -> Result<R> + Send + 'static,
        C: FnOnce(Result<R>) + Send + 'static,
    {
        self.enqueue(Box::new(move |db: Result<&Database>| {
            completion(db.and_then(|db| guarded(|| job(db))));
        }));
    }

    /// Requests a migration and returns immediately.
    ///
    /// Jobs queued before this call finish first; jobs queued after it wait
    /// until the migration is done. `completion` receives the final version
    /// on the migration lane.
    pub fn migrate<C>(&self, migration: Migration, completion: C)
    where
        C: FnOnce(Result<i32>) + Send + 'static,
    {
        let rejected = {
            // Tickets must reach both lanes in the same order.
            let _submit = self.submit.lock();
            let ticket = self.shared.barrier.enter();
            debug!(
                engine = self.shared.id,
                ticket,
                target = migration.target(),
                "migration barrier entered"
            );
            let (reached, reached_rx) = mpsc::channel();
            // Without an access lane the fence is dropped and the task sees
            // a closed channel.
            let _ = self.access.send(AccessMessage::Fence { ticket, reached });
            let task = MigrationTask {
                ticket,
                reached: reached_rx,
                migration,
                completion: Box::new(completion),
            };
            match self.migrations.send(MigrationMessage::Task(task)) {
                Err(mpsc::SendError(MigrationMessage::Task(task))) => Some(task),
                _ => None,
            }
        };
        if let Some(task) = rejected {
            self.shared.barrier.leave(task.ticket);
            (task.completion)(Err(SqliteError::Disconnected));
        }
    }

    /// Runs a migration and blocks until it completes.
    ///
    /// From inside a job or migration step of this engine the migration
    /// runs inline, since the caller already has exclusive access.
    ///
    /// # Errors
    ///
    /// Returns the migration's error; a panicking step or finalizer is
    /// reported as [`SqliteError::Migration`]. Calling this from a migration
    /// completion callback fails with [`SqliteError::Migration`], because
    /// that callback runs on the migration lane itself.
    pub fn migrate_blocking(&self, migration: Migration) -> Result<i32> {
        if self.is_active_here() {
            debug!(engine = self.shared.id, "running nested migration inline");
            let db = self.shared.db.lock();
            return run_migration(migration, &db);
        }
        if thread::current().id() == self.migration_lane {
            return Err(SqliteError::Migration(
                "cannot wait for a migration from the migration lane".to_string(),
            ));
        }
        let (reply, result) = mpsc::channel();
        self.migrate(migration, move |outcome| {
            let _ = reply.send(outcome);
        });
        result.recv().map_err(|_| SqliteError::Disconnected)?
    }

    /// Whether a requested migration has not finished yet.
    pub fn is_migrating(&self) -> bool {
        self.shared.barrier.pending() > 0
    }

    /// Opens `path` on the access lane.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        self.run(move |db| db.open(&path))
    }

    pub fn open_read_only(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        self.run(move |db| db.open_read_only(&path))
    }

    pub fn open_in_memory(&self) -> Result<()> {
        self.run(|db| db.open_in_memory())
    }

    /// Closes the connection on the access lane.
    pub fn close(&self) -> Result<()> {
        self.run(|db| db.close())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.migrations.send(MigrationMessage::Shutdown);
        let _ = self.access.send(AccessMessage::Shutdown);

        let current = thread::current().id();
        if self.lanes.iter().any(|lane| lane.thread().id() == current) {
            // Dropped from inside a lane; joining would wait on ourselves.
            return;
        }
        for lane in self.lanes.drain(..) {
            if lane.join().is_err() {
                warn!(engine = self.shared.id, "engine lane panicked");
            }
        }
        debug!(engine = self.shared.id, "engine stopped");
    }
}
