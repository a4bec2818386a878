//! SQLite-backed mirror statistics.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use placefinder_core::{MirrorEndpoint, MirrorStats, Observation, StatsStore, StatsStoreError};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

const BACKEND: &str = "sqlite";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable statistics shared by every process pointing at the same file.
///
/// Updates run inside `IMMEDIATE` transactions, so concurrent writers
/// serialise on the database lock instead of overwriting each other.
#[derive(Debug)]
pub struct SqliteStatsStore {
    connection: Mutex<Connection>,
    location: Option<Utf8PathBuf>,
}

fn sql_error(source: rusqlite::Error) -> StatsStoreError {
    StatsStoreError::new(BACKEND, source)
}

fn to_sql_count(value: u64) -> Result<i64, StatsStoreError> {
    i64::try_from(value).map_err(|err| StatsStoreError::new(BACKEND, err))
}

fn from_sql_count(value: i64) -> Result<u64, StatsStoreError> {
    u64::try_from(value).map_err(|err| StatsStoreError::new(BACKEND, err))
}

fn unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| i64::try_from(elapsed.as_secs()).ok())
        .unwrap_or_default()
}

impl SqliteStatsStore {
    /// Open (or create) the statistics database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened and initialised.
    pub fn open(path: &Utf8Path) -> Result<Self, StatsStoreError> {
        placefinder_fs::ensure_parent_dir(path).map_err(|err| {
            StatsStoreError::new(
                BACKEND,
                format!("failed to create parent directory for {path}: {err}"),
            )
        })?;
        let connection = Connection::open(path.as_std_path()).map_err(sql_error)?;
        Self::initialise(connection, Some(path.to_owned()))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StatsStoreError> {
        let connection = Connection::open_in_memory().map_err(sql_error)?;
        Self::initialise(connection, None)
    }

    fn initialise(
        connection: Connection,
        location: Option<Utf8PathBuf>,
    ) -> Result<Self, StatsStoreError> {
        connection.busy_timeout(BUSY_TIMEOUT).map_err(sql_error)?;
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS mirror_stats (
                    endpoint TEXT PRIMARY KEY,
                    attempts INTEGER NOT NULL,
                    successes INTEGER NOT NULL,
                    avg_latency_ms REAL,
                    updated_at INTEGER NOT NULL
                )",
                [],
            )
            .map_err(sql_error)?;
        Ok(Self {
            connection: Mutex::new(connection),
            location,
        })
    }

    /// Location of the database file, if it is file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        self.location.as_deref()
    }
}

fn read_stats(
    connection: &Connection,
    endpoint: &MirrorEndpoint,
) -> Result<Option<MirrorStats>, StatsStoreError> {
    let row = connection
        .query_row(
            "SELECT attempts, successes, avg_latency_ms FROM mirror_stats WHERE endpoint = ?1",
            params![endpoint.as_str()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                ))
            },
        )
        .optional()
        .map_err(sql_error)?;
    row.map(|(attempts, successes, avg_latency_ms)| {
        Ok(MirrorStats {
            attempts: from_sql_count(attempts)?,
            successes: from_sql_count(successes)?,
            avg_latency_ms,
        })
    })
    .transpose()
}

fn write_stats(
    connection: &Connection,
    endpoint: &MirrorEndpoint,
    stats: &MirrorStats,
) -> Result<(), StatsStoreError> {
    connection
        .execute(
            "INSERT INTO mirror_stats (endpoint, attempts, successes, avg_latency_ms, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(endpoint) DO UPDATE SET
                attempts = excluded.attempts,
                successes = excluded.successes,
                avg_latency_ms = excluded.avg_latency_ms,
                updated_at = excluded.updated_at",
            params![
                endpoint.as_str(),
                to_sql_count(stats.attempts)?,
                to_sql_count(stats.successes)?,
                stats.avg_latency_ms,
                unix_seconds()
            ],
        )
        .map_err(sql_error)?;
    Ok(())
}

impl StatsStore for SqliteStatsStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn load_all(&self) -> Result<HashMap<MirrorEndpoint, MirrorStats>, StatsStoreError> {
        let connection = self.connection.lock();
        let mut statement = connection
            .prepare("SELECT endpoint, attempts, successes, avg_latency_ms FROM mirror_stats")
            .map_err(sql_error)?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            })
            .map_err(sql_error)?;
        let mut snapshot = HashMap::new();
        for row in rows {
            let (endpoint, attempts, successes, avg_latency_ms) = row.map_err(sql_error)?;
            snapshot.insert(
                MirrorEndpoint::from(endpoint),
                MirrorStats {
                    attempts: from_sql_count(attempts)?,
                    successes: from_sql_count(successes)?,
                    avg_latency_ms,
                },
            );
        }
        Ok(snapshot)
    }

    fn save(&self, endpoint: &MirrorEndpoint, stats: &MirrorStats) -> Result<(), StatsStoreError> {
        let connection = self.connection.lock();
        write_stats(&connection, endpoint, stats)
    }

    fn record(
        &self,
        endpoint: &MirrorEndpoint,
        observation: Observation,
    ) -> Result<MirrorStats, StatsStoreError> {
        let mut connection = self.connection.lock();
        let transaction = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sql_error)?;
        let mut stats = read_stats(&transaction, endpoint)?.unwrap_or_default();
        stats.record(observation);
        write_stats(&transaction, endpoint, &stats)?;
        transaction.commit().map_err(sql_error)?;
        Ok(stats)
    }
}
