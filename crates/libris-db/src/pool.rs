//! # Connection Pool
//!
//! Opens the Libris SQLite file and hands out repositories bound to it.
//!
//! ```text
//!   DbConfig ──► Database::new ──► SqlitePool (WAL, FK on, busy_timeout)
//!                     │                 │
//!                     │                 ├──► books()   / authors()
//!                     │                 ├──► users()
//!                     ▼                 └──► loans()   (LoanLedger)
//!               embedded migrations
//! ```
//!
//! Readers run next to the single WAL writer. A second writer waits on the
//! lock for up to `busy_timeout`, and that wait is what serializes two loan
//! transactions on the same book.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use libris_core::{Clock, SystemClock};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::ledger::LoanLedger;
use crate::migrations;
use crate::repository::author::AuthorRepository;
use crate::repository::book::BookRepository;
use crate::repository::user::UserRepository;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Where the catalog lives and how many connections may touch it.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/libris/libris.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,
    /// Pool ceiling (default 5).
    pub max_connections: u32,
    /// Connections kept open while idle (default 1).
    pub min_connections: u32,
    /// Wait for a free pooled connection (default 30s).
    pub connect_timeout: Duration,
    /// Close idle connections after this long; `None` never does (default 10m).
    pub idle_timeout: Option<Duration>,
    /// Wait for the SQLite write lock (default 5s).
    pub busy_timeout: Duration,
    /// Apply pending migrations in `Database::new` (default on).
    pub run_migrations: bool,
}

impl DbConfig {
    /// Configuration for a file database, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Turns off migrations for callers that manage the schema themselves.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Private in-memory database for tests. One connection that is never
    /// recycled, since the data lives only as long as that connection.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the catalog database.
///
/// Cheap to clone: the pool and the clock are shared handles. Every
/// request handler gets its own clone.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    /// Source of "now" for every timestamp this crate writes.
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("pool", &self.pool).finish_non_exhaustive()
    }
}

impl Database {
    /// Opens the pool and brings the schema up to date.
    ///
    /// Every connection runs in WAL mode with `synchronous = NORMAL`,
    /// foreign keys on and the configured busy timeout. The clock defaults
    /// to [`SystemClock`].
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening catalog database");

        let base_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
        } else {
            SqliteConnectOptions::from_str(&format!(
                "sqlite://{}?mode=rwc",
                config.database_path.display()
            ))
        }
        .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let connect_options = base_options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // RESTRICT on loans depends on this
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        debug!(busy_timeout = ?config.busy_timeout, "SQLite options ready");

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout);

        if config.is_in_memory() {
            pool_options = pool_options.max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(max_connections = config.max_connections, "Catalog pool ready");

        let db = Database {
            pool,
            clock: Arc::new(SystemClock),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Replaces the clock (tests pass a `FixedClock`).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Applies any migration not yet recorded. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::apply(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the clock shared by repositories and the ledger.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn books(&self) -> BookRepository {
        BookRepository::new(self.pool.clone(), self.clock())
    }

    pub fn authors(&self) -> AuthorRepository {
        AuthorRepository::new(self.pool.clone(), self.clock())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone(), self.clock())
    }

    /// The ledger owns every write that touches `available_copies`.
    pub fn loans(&self) -> LoanLedger {
        LoanLedger::new(self.pool.clone(), self.clock())
    }

    /// Waits for checked-out connections, then closes the pool.
    pub async fn close(&self) {
        info!("Closing catalog pool");
        self.pool.close().await;
    }

    /// `true` when a trivial query round-trips.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
