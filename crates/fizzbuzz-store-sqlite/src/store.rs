// crates/fizzbuzz-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Stats Store
// Description: Durable StatsStore backed by SQLite WAL.
// Purpose: Count hits per configuration with atomic upserts.
// Dependencies: fizzbuzz-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`StatsStore`] using `SQLite`. Every
//! configuration owns exactly one row in the `stat` table; increments are a
//! single `INSERT ... ON CONFLICT DO UPDATE` statement and the most-frequent
//! query orders ties by the five configuration columns.
//!
//! Automatic WAL checkpointing is disabled on every connection. The store
//! instead runs `wal_checkpoint(RESTART)` itself every
//! `checkpoint_interval` increments, after draining in-flight increments
//! through a per-instance gate.
//!
//! The path `:memory:` opens a volatile database on a single connection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use fizzbuzz_core::CancelToken;
use fizzbuzz_core::Configuration;
use fizzbuzz_core::MostFrequent;
use fizzbuzz_core::StatsError;
use fizzbuzz_core::StatsStore;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::gate::Admission;
use crate::gate::CheckpointGate;
use crate::gate::InFlight;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Largest busy timeout `SQLite` accepts (ms, `i32::MAX`).
pub const MAX_BUSY_TIMEOUT_MS: u64 = 2_147_483_647;
/// Default number of increments between checkpoints.
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 1_000;
/// Default bound on waiting for in-flight increments before a checkpoint (ms).
pub const DEFAULT_CHECKPOINT_DRAIN_TIMEOUT_MS: u64 = 10_000;
/// Default read connection pool size.
pub const DEFAULT_READ_POOL_SIZE: usize = 4;
/// Prepared statement cache capacity per connection.
const STATEMENT_CACHE_CAPACITY: usize = 8;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Path that selects a volatile, non-file-backed database.
pub const VOLATILE_PATH: &str = ":memory:";

/// Upsert recording one hit.
const UPSERT_SQL: &str = "INSERT INTO \"stat\" (\"limit\", \"int1\", \"int2\", \"str1\", \"str2\", \
                          \"count\") VALUES (?1, ?2, ?3, ?4, ?5, 1) ON CONFLICT DO UPDATE SET \
                          \"count\" = \"count\" + 1";
/// Highest count, ties broken by the configuration ordering.
const MOST_FREQUENT_SQL: &str = "SELECT \"limit\", \"int1\", \"int2\", \"str1\", \"str2\", \
                                 \"count\" FROM \"stat\" WHERE \"count\" = (SELECT max(\"count\") \
                                 FROM \"stat\") ORDER BY \"limit\", \"int1\", \"int2\", \"str1\", \
                                 \"str2\" LIMIT 1";
/// Blocking WAL checkpoint that restarts the log.
const CHECKPOINT_SQL: &str = "PRAGMA wal_checkpoint(RESTART)";

/// Row shape returned by [`MOST_FREQUENT_SQL`].
type StatRow = (i64, i64, i64, String, String, i64);

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    Full,
    /// Normal synchronous mode (balanced).
    #[default]
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` stats store.
///
/// # Invariants
/// - `path` is [`VOLATILE_PATH`] or resolves to a file path (not a directory).
/// - `busy_timeout_ms` and `checkpoint_drain_timeout_ms` are milliseconds.
/// - `busy_timeout_ms` is in `1 ..= MAX_BUSY_TIMEOUT_MS`.
/// - `checkpoint_interval` of zero disables automatic checkpoints.
/// - `read_pool_size` must be greater than zero; volatile stores ignore it.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    pub sync_mode: SqliteSyncMode,
    /// Increments between automatic WAL checkpoints.
    pub checkpoint_interval: u64,
    /// Maximum wait for in-flight increments before a checkpoint (milliseconds).
    pub checkpoint_drain_timeout_ms: u64,
    /// Number of read-only connections used for most-frequent queries.
    pub read_pool_size: usize,
}

impl SqliteStoreConfig {
    /// Creates a configuration with default tuning for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            checkpoint_drain_timeout_ms: DEFAULT_CHECKPOINT_DRAIN_TIMEOUT_MS,
            read_pool_size: DEFAULT_READ_POOL_SIZE,
        }
    }

    /// Creates a configuration for a volatile database.
    #[must_use]
    pub fn volatile() -> Self {
        Self::new(VOLATILE_PATH)
    }

    /// Returns true when the path selects a volatile database.
    #[must_use]
    pub fn is_volatile(&self) -> bool {
        self.path.as_os_str() == VOLATILE_PATH
    }

    /// Returns true when the store runs its own WAL checkpoints.
    #[must_use]
    pub fn checkpoints_enabled(&self) -> bool {
        !self.is_volatile() && self.journal_mode == SqliteStoreMode::Wal
    }
}

/// Validates runtime limits in the store configuration.
fn validate_runtime_limits(config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    if config.busy_timeout_ms == 0 {
        return Err(SqliteStoreError::Invalid(
            "busy_timeout_ms must be greater than zero".to_string(),
        ));
    }
    if config.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
        return Err(SqliteStoreError::Invalid(format!(
            "busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
        )));
    }
    if config.checkpoint_drain_timeout_ms == 0 {
        return Err(SqliteStoreError::Invalid(
            "checkpoint_drain_timeout_ms must be greater than zero".to_string(),
        ));
    }
    if config.read_pool_size == 0 {
        return Err(SqliteStoreError::Invalid(
            "read_pool_size must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - A failed increment never changes the stored count.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store configuration or data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// WAL checkpoint failed or reported busy.
    #[error("sqlite store checkpoint failed: {0}")]
    Checkpoint(String),
    /// Store was closed.
    #[error("sqlite store closed")]
    Closed,
    /// Operation cancelled before it changed anything.
    #[error("sqlite store operation cancelled")]
    Cancelled,
}

impl From<SqliteStoreError> for StatsError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Checkpoint(message) => {
                Self::Store(format!("checkpoint failed: {message}"))
            }
            SqliteStoreError::Closed => Self::Closed,
            SqliteStoreError::Cancelled => Self::Cancelled,
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed stats store with WAL support.
///
/// # Invariants
/// - All writes go through the single writer connection.
/// - Connection access is serialized through per-connection mutexes.
/// - After [`SqliteStatsStore::close`] every connection slot is empty.
#[derive(Clone)]
pub struct SqliteStatsStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Writer connection guarded by a mutex; `None` once closed.
    write_connection: Arc<Mutex<Option<Connection>>>,
    /// Read-only connection pool; empty for volatile stores.
    read_connections: Arc<Vec<Mutex<Option<Connection>>>>,
    /// Round-robin cursor for read connection selection.
    read_cursor: Arc<AtomicUsize>,
    /// Drain barrier for checkpoints.
    gate: Arc<CheckpointGate>,
    /// Maintenance counters.
    counters: Arc<MaintenanceCounters>,
}

/// Point-in-time maintenance counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SqliteMaintenanceSnapshot {
    /// Increments applied since open.
    pub increments: u64,
    /// Checkpoints that completed.
    pub checkpoints_run: u64,
    /// Checkpoints skipped because in-flight increments did not drain in time.
    pub checkpoints_skipped: u64,
    /// Checkpoints that failed or reported busy.
    pub checkpoints_failed: u64,
}

/// Live maintenance counters.
#[derive(Debug, Default)]
struct MaintenanceCounters {
    /// Increments applied.
    increments: AtomicU64,
    /// Completed checkpoints.
    checkpoints_run: AtomicU64,
    /// Skipped checkpoints.
    checkpoints_skipped: AtomicU64,
    /// Failed checkpoints.
    checkpoints_failed: AtomicU64,
}

impl MaintenanceCounters {
    /// Returns a snapshot of the counters.
    fn snapshot(&self) -> SqliteMaintenanceSnapshot {
        SqliteMaintenanceSnapshot {
            increments: self.increments.load(Ordering::Relaxed),
            checkpoints_run: self.checkpoints_run.load(Ordering::Relaxed),
            checkpoints_skipped: self.checkpoints_skipped.load(Ordering::Relaxed),
            checkpoints_failed: self.checkpoints_failed.load(Ordering::Relaxed),
        }
    }
}

impl SqliteStatsStore {
    /// Opens the store, creating the schema when needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path, schema or connections are
    /// unusable.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_runtime_limits(&config)?;
        let volatile = config.is_volatile();
        if !volatile {
            validate_store_path(&config.path)?;
            ensure_parent_dir(&config.path)?;
        }
        let mut writer = open_connection(&config)?;
        initialize_schema(&mut writer)?;
        warm_statements(&writer, true, config.checkpoints_enabled())?;
        let mut readers = Vec::new();
        if !volatile {
            for _ in 0 .. config.read_pool_size {
                let reader = open_read_connection(&config)?;
                warm_statements(&reader, false, false)?;
                readers.push(Mutex::new(Some(reader)));
            }
        }
        let interval = if config.checkpoints_enabled() { config.checkpoint_interval } else { 0 };
        Ok(Self {
            config,
            write_connection: Arc::new(Mutex::new(Some(writer))),
            read_connections: Arc::new(readers),
            read_cursor: Arc::new(AtomicUsize::new(0)),
            gate: Arc::new(CheckpointGate::new(interval)),
            counters: Arc::new(MaintenanceCounters::default()),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Returns the maintenance counters.
    #[must_use]
    pub fn maintenance_snapshot(&self) -> SqliteMaintenanceSnapshot {
        self.counters.snapshot()
    }

    /// Runs a WAL checkpoint now, behind the drain barrier.
    ///
    /// Returns `Ok(false)` when checkpoints do not apply to this store or
    /// in-flight increments did not drain in time.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the checkpoint fails or reports busy.
    pub fn checkpoint(&self) -> Result<bool, SqliteStoreError> {
        if !self.config.checkpoints_enabled() {
            return Ok(false);
        }
        self.gate.claim_checkpoint()?;
        let outcome = self.drain_and_checkpoint();
        self.gate.finish_checkpoint(matches!(outcome, Ok(true)), false)?;
        outcome
    }

    /// Closes every connection; later operations fail with
    /// [`SqliteStoreError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when a connection fails to close.
    /// Every connection is released either way.
    pub fn close(&self) -> Result<(), SqliteStoreError> {
        let mut first_error = None;
        for slot in self.read_connections.iter() {
            let taken = lock_slot(slot)?.take();
            if let Some(connection) = taken
                && let Err(err) = close_connection(connection)
            {
                first_error.get_or_insert(err);
            }
        }
        let taken = lock_slot(&self.write_connection)?.take();
        if let Some(connection) = taken
            && let Err(err) = close_connection(connection)
        {
            first_error.get_or_insert(err);
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Returns true once [`SqliteStatsStore::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock_slot(&self.write_connection).map_or(true, |slot| slot.is_none())
    }

    /// Records one hit, running a due checkpoint first.
    ///
    /// A due checkpoint that times out or fails is counted in the maintenance
    /// snapshot only; the hit is still applied.
    fn record(
        &self,
        config: &Configuration,
        cancel: Option<&CancelToken>,
    ) -> Result<(), SqliteStoreError> {
        check_cancel(cancel)?;
        let _in_flight = match self.gate.admit()? {
            Admission::Proceed => InFlight::new(&self.gate),
            Admission::Checkpoint => {
                let _ = self.drain_and_checkpoint();
                self.gate.finish_checkpoint(true, true)?;
                InFlight::new(&self.gate)
            }
        };
        let slot = lock_slot(&self.write_connection)?;
        let connection = slot.as_ref().ok_or(SqliteStoreError::Closed)?;
        check_cancel(cancel)?;
        let mut statement =
            connection.prepare_cached(UPSERT_SQL).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        statement
            .execute(params![
                config.limit,
                config.divisor1,
                config.divisor2,
                config.replacement1,
                config.replacement2
            ])
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        self.counters.increments.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Queries the most frequent configuration on a pooled connection.
    fn query(&self, cancel: Option<&CancelToken>) -> Result<MostFrequent, SqliteStoreError> {
        check_cancel(cancel)?;
        let slot = if self.read_connections.is_empty() {
            lock_slot(&self.write_connection)?
        } else {
            let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % self.read_connections.len();
            lock_slot(&self.read_connections[index])?
        };
        let connection = slot.as_ref().ok_or(SqliteStoreError::Closed)?;
        check_cancel(cancel)?;
        query_most_frequent(connection)
    }

    /// Drains in-flight increments and checkpoints; `Ok(false)` on drain timeout.
    fn drain_and_checkpoint(&self) -> Result<bool, SqliteStoreError> {
        let timeout = Duration::from_millis(self.config.checkpoint_drain_timeout_ms);
        if !self.gate.drain(timeout)? {
            self.counters.checkpoints_skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }
        let slot = lock_slot(&self.write_connection)?;
        let connection = slot.as_ref().ok_or(SqliteStoreError::Closed)?;
        match run_checkpoint(connection) {
            Ok(()) => {
                self.counters.checkpoints_run.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Err(err) => {
                self.counters.checkpoints_failed.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }
}

impl StatsStore for SqliteStatsStore {
    fn increment(&self, config: &Configuration) -> Result<(), StatsError> {
        self.record(config, None).map_err(StatsError::from)
    }

    fn most_frequent(&self) -> Result<MostFrequent, StatsError> {
        self.query(None).map_err(StatsError::from)
    }

    fn increment_with(&self, config: &Configuration, cancel: &CancelToken) -> Result<(), StatsError> {
        self.record(config, Some(cancel)).map_err(StatsError::from)
    }

    fn most_frequent_with(&self, cancel: &CancelToken) -> Result<MostFrequent, StatsError> {
        self.query(Some(cancel)).map_err(StatsError::from)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Fails with [`SqliteStoreError::Cancelled`] when the token has fired.
fn check_cancel(cancel: Option<&CancelToken>) -> Result<(), SqliteStoreError> {
    if cancel.is_some_and(CancelToken::is_cancelled) {
        return Err(SqliteStoreError::Cancelled);
    }
    Ok(())
}

/// Locks a connection slot.
fn lock_slot(
    slot: &Mutex<Option<Connection>>,
) -> Result<MutexGuard<'_, Option<Connection>>, SqliteStoreError> {
    slot.lock().map_err(|_| SqliteStoreError::Db("connection mutex poisoned".to_string()))
}

/// Releases cached statements and closes a connection.
fn close_connection(connection: Connection) -> Result<(), SqliteStoreError> {
    connection.flush_prepared_statement_cache();
    connection.close().map_err(|(_, err)| SqliteStoreError::Db(err.to_string()))
}

/// Reads the most frequent row.
fn query_most_frequent(connection: &Connection) -> Result<MostFrequent, SqliteStoreError> {
    let mut statement = connection
        .prepare_cached(MOST_FREQUENT_SQL)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let row: Option<StatRow> = statement
        .query_row(params![], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
        })
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let Some((limit, divisor1, divisor2, replacement1, replacement2, count)) = row else {
        return Ok(MostFrequent::empty());
    };
    let count = u64::try_from(count)
        .ok()
        .filter(|count| *count > 0)
        .ok_or_else(|| SqliteStoreError::Corrupt(format!("invalid hit count: {count}")))?;
    Ok(MostFrequent::new(
        count,
        Configuration::new(limit, divisor1, divisor2, replacement1, replacement2),
    ))
}

/// Runs a restarting WAL checkpoint and checks the busy flag.
fn run_checkpoint(connection: &Connection) -> Result<(), SqliteStoreError> {
    let mut statement = connection
        .prepare_cached(CHECKPOINT_SQL)
        .map_err(|err| SqliteStoreError::Checkpoint(err.to_string()))?;
    let (busy, log_frames, checkpointed): (i64, i64, i64) = statement
        .query_row(params![], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .map_err(|err| SqliteStoreError::Checkpoint(err.to_string()))?;
    if busy != 0 {
        return Err(SqliteStoreError::Checkpoint(format!(
            "database busy ({checkpointed} of {log_frames} frames checkpointed)"
        )));
    }
    Ok(())
}

/// Prepares the statements a connection will use so they sit in its cache.
fn warm_statements(
    connection: &Connection,
    writer: bool,
    checkpoints: bool,
) -> Result<(), SqliteStoreError> {
    connection.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAPACITY);
    connection
        .prepare_cached(MOST_FREQUENT_SQL)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    if writer {
        connection
            .prepare_cached(UPSERT_SQL)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    }
    if checkpoints {
        connection
            .prepare_cached(CHECKPOINT_SQL)
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    }
    Ok(())
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Validates the store path against length limits and directory targets.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must be non-empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid("store path component too long".to_string()));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(format!(
            "store path is a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Opens the writer connection and applies pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Opens a query-only pooled connection.
fn open_read_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch("PRAGMA query_only = ON; PRAGMA temp_store = memory;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(connection)
}

/// Applies the journal, sync and checkpoint pragmas.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch("PRAGMA temp_store = memory;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    if config.checkpoints_enabled() {
        connection
            .execute_batch("PRAGMA wal_autocheckpoint = 0;")
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    }
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS \"stat\" (
                    \"limit\" INTEGER NOT NULL,
                    \"int1\" INTEGER NOT NULL,
                    \"int2\" INTEGER NOT NULL,
                    \"str1\" TEXT NOT NULL,
                    \"str2\" TEXT NOT NULL,
                    \"count\" INTEGER NOT NULL,
                    PRIMARY KEY (\"limit\", \"int1\", \"int2\", \"str1\", \"str2\")
                ) STRICT, WITHOUT ROWID;
                CREATE INDEX IF NOT EXISTS idx_stat_count ON \"stat\" (\"count\");",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(SCHEMA_VERSION) => {}
        Some(other) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version {other} (expected {SCHEMA_VERSION})"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
