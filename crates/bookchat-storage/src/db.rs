//! Database connection management.
//!
//! Wraps a single rusqlite Connection in a Mutex for thread-safe access.
//! Every caller holds the lock only for the duration of one store call, so
//! concurrent requests serialize on the connection rather than sharing it.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;
use tracing::{info, warn};

use bookchat_core::error::BookchatError;

use crate::{migrations, text, vector};

/// Thread-safe SQLite database wrapper.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path.
    ///
    /// Configures WAL mode, the busy timeout and the SQL functions
    /// (`cosine_similarity` and the Unicode-aware `LIKE`), then runs all
    /// pending migrations.
    pub fn new(path: &Path, busy_timeout: Duration) -> Result<Self, BookchatError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| BookchatError::Storage(format!("Failed to open database: {}", e)))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| BookchatError::Storage(format!("Failed to set pragmas: {}", e)))?;

        conn.busy_timeout(busy_timeout)
            .map_err(|e| BookchatError::Storage(format!("Failed to set busy timeout: {}", e)))?;

        info!("Database opened at {}", path.display());
        Self::finish(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, BookchatError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| BookchatError::Storage(format!("Failed to open in-memory db: {}", e)))?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| BookchatError::Storage(format!("Failed to set pragmas: {}", e)))?;

        Self::finish(conn)
    }

    fn finish(conn: Connection) -> Result<Self, BookchatError> {
        vector::register_functions(&conn)
            .and_then(|_| text::register_functions(&conn))
            .map_err(|e| {
                BookchatError::Storage(format!("Failed to register SQL functions: {}", e))
            })?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Execute a closure with a reference to the underlying connection.
    ///
    /// The mutex is held for the duration of the closure and released when
    /// it returns, on success and on error alike.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, BookchatError>
    where
        F: FnOnce(&Connection) -> Result<T, BookchatError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| BookchatError::Storage(format!("Database lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Like [`Database::with_conn`], but with `PRAGMA query_only` switched on
    /// for the duration of the closure. Any write attempted inside fails with
    /// `SQLITE_READONLY`.
    pub fn with_read_only<F, T>(&self, f: F) -> Result<T, BookchatError>
    where
        F: FnOnce(&Connection) -> Result<T, BookchatError>,
    {
        self.with_conn(|conn| {
            conn.pragma_update(None, "query_only", true).map_err(|e| {
                BookchatError::Storage(format!("Failed to enter read-only scope: {}", e))
            })?;

            let result = f(conn);

            if let Err(e) = conn.pragma_update(None, "query_only", false) {
                warn!(error = %e, "Failed to leave read-only scope");
            }
            result
        })
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
