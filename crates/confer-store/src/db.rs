//! SQLite connection for the authenticated session store.
//!
//! One WAL-mode connection per process, opened inside the data directory
//! and shared behind a mutex. Separate `confer` invocations may have the
//! same database open, so the connection carries a busy timeout instead
//! of failing fast on a locked file. Schema migrations run before the
//! connection is handed out.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use tracing::info;

use confer_core::error::ConferError;

use crate::migrations;

/// Database filename inside the data directory.
pub const DB_FILE: &str = "confer.db";

/// How long a writer waits on another process's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the session database.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (or creates) `confer.db` inside the data directory and brings
    /// the schema up to date.
    pub fn open(data_dir: &Path) -> Result<Self, ConferError> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(DB_FILE);

        let conn = Connection::open(&path)
            .map_err(|e| ConferError::Store(format!("Failed to open {}: {}", path.display(), e)))?;
        let db = Self::from_connection(conn)?;

        info!(path = %path.display(), "Session database ready");
        Ok(db)
    }

    /// Opens an in-memory database with the full schema, for tests.
    pub fn in_memory() -> Result<Self, ConferError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ConferError::Store(format!("Failed to open in-memory db: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, ConferError> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| ConferError::Store(format!("Failed to set busy timeout: {}", e)))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| ConferError::Store(format!("Failed to set pragmas: {}", e)))?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs a closure against the connection, holding the lock for its
    /// duration. All store queries go through here.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ConferError>
    where
        F: FnOnce(&Connection) -> Result<T, ConferError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConferError::Store(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }
}
