//! SQLite pool for the session database.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

const MEMORY_PATH: &str = ":memory:";

/// Pool sizing and lock-wait settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a writer waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Upper bound on open connections.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),

    /// Each pooled `:memory:` connection would see its own empty database.
    #[error("an in-memory database cannot back a pool of {0} connections")]
    SharedMemory(u32),
}

/// Opens a pool over the session database at `db_path`.
///
/// Every connection runs in WAL mode with `synchronous = NORMAL` and the
/// configured busy timeout, so several server instances can share one file.
///
/// # Errors
///
/// Returns [`PoolError::SharedMemory`] for `:memory:` with more than one
/// connection, and [`PoolError::PoolInit`] if the first connection fails to
/// open or configure.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    if db_path == MEMORY_PATH && settings.pool_max_size > 1 {
        return Err(PoolError::SharedMemory(settings.pool_max_size));
    }

    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let busy_timeout_ms = settings.busy_timeout_ms;
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(flags)
        .with_init(move |conn| configure(conn, busy_timeout_ms));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?;

    tracing::debug!(path = db_path, max_size = settings.pool_max_size, "session database pool ready");
    Ok(pool)
}

fn configure(conn: &mut Connection, busy_timeout_ms: u64) -> Result<(), rusqlite::Error> {
    // In-memory databases report "memory".
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    if mode != "wal" && mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal_mode is {mode}, expected wal")),
        ));
    }
    conn.execute_batch(&format!(
        "PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = {busy_timeout_ms};"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_pool_applies_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let pool = create_pool(
            path.to_str().unwrap(),
            DbRuntimeSettings {
                busy_timeout_ms: 2_500,
                pool_max_size: 3,
            },
        )
        .unwrap();
        let conn = pool.get().unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .unwrap();
        let busy_timeout: i64 = conn
            .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
            .unwrap();
        let synchronous: i64 = conn
            .query_row("PRAGMA synchronous;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
        assert_eq!(busy_timeout, 2_500);
        assert_eq!(synchronous, 1);
        assert_eq!(pool.max_size(), 3);
    }

    #[test]
    fn shared_memory_pool_is_refused() {
        let err = create_pool(":memory:", DbRuntimeSettings::default()).unwrap_err();
        assert!(matches!(err, PoolError::SharedMemory(8)));

        let single = DbRuntimeSettings {
            pool_max_size: 1,
            ..Default::default()
        };
        assert!(create_pool(":memory:", single).is_ok());
    }
}
