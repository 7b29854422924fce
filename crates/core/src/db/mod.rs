//! SQLite-backed [`DocumentStore`].
//!
//! Documents, their revision snapshots and their meta rows live in one
//! database file. The schema is versioned through `user_version` (see
//! [`schema`]); the open-fork uniqueness index arrives with version 2.
//!
//! [`DocumentStore`]: crate::store::DocumentStore

pub mod queries;
pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::errors::StoreError;

/// Document store on a single SQLite connection.
///
/// File databases run in WAL mode. Foreign keys are on so revisions and
/// meta rows go with their document.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the document database at `path`, creating the file if needed.
    /// Call [`initialize`](Self::initialize) before use.
    pub fn new<P: AsRef<Path>>(path: P, busy_timeout_ms: u64) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening document database");

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(&format!("PRAGMA busy_timeout = {};", busy_timeout_ms))?;

        debug!(busy_timeout_ms, "document database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A throwaway store with the current schema, gone when dropped.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.initialize()?;
        Ok(db)
    }

    /// The store named by `config`: a migrated file database, or an
    /// in-memory one when no path is set.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        match &config.database_path {
            Some(path) => {
                let db = Self::new(path, config.busy_timeout_ms)?;
                db.initialize()?;
                Ok(db)
            }
            None => {
                debug!("no database path configured, using in-memory store");
                Self::in_memory()
            }
        }
    }

    /// Apply pending schema migrations. Safe to call more than once.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let conn = self.conn();
        schema::run_migrations(&conn)?;
        debug!("document schema is up to date");
        Ok(())
    }

    /// Lock the connection. A lock poisoned by a panicking holder is taken
    /// over.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("document store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Run `f` in one transaction: committed on `Ok`, rolled back on `Err`.
    pub fn transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}
