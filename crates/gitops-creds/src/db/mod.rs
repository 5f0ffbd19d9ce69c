//! SQLite storage for GitOps credential records.
//!
//! [`Database`] owns one connection behind a mutex; the repository
//! functions in [`gitops_config_repo`] borrow it through
//! [`Database::with_conn`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

pub mod error;
pub mod gitops_config_repo;
pub mod migrations;

pub use error::DatabaseError;

/// How long a statement waits on a lock held by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a [`Database`] keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    Memory,
}

impl std::fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseLocation::File(path) => write!(f, "{}", path.display()),
            DatabaseLocation::Memory => f.write_str(":memory:"),
        }
    }
}

/// Cloneable handle to the credential database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    location: Arc<DatabaseLocation>,
    schema_version: u32,
}

impl Database {
    /// Opens or creates the database file, creating parent directories,
    /// and brings the schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn, DatabaseLocation::File(path.to_path_buf()))
    }

    /// A private in-memory database, migrated.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::init(Connection::open_in_memory()?, DatabaseLocation::Memory)
    }

    fn init(conn: Connection, location: DatabaseLocation) -> Result<Self, DatabaseError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let schema_version = migrations::run_all(&conn)?;

        log::info!(
            "Credential database ready at {} (schema v{})",
            location,
            schema_version
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: Arc::new(location),
            schema_version,
        })
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }

    /// Schema version reached when the database was opened.
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// `~/.gitops-creds/data/credentials.db`, when a home directory is known.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".gitops-creds").join("data").join("credentials.db"))
}
