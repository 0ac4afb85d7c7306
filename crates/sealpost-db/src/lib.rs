//! # sealpost-db
//!
//! Relational store for the Sealpost board: one SQLite database holding
//! people, public keys, sessions, messages and message recipients.
//!
//! ## Schema
//!
//! - WAL mode, foreign keys enforced
//! - All timestamps are Unix epoch seconds
//! - Schema version stored in `PRAGMA user_version`
//!
//! Mutual exclusion lives here and nowhere else: uniqueness of an email,
//! of a session code and of a (person, key) pair is enforced by constraints,
//! so several processes may share one database file safely.

pub mod migrations;
pub mod queries;
pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 2;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate {0}")]
    Duplicate(String),

    #[error("constraint violation: {0}")]
    Constraint(String),
}

impl DbError {
    /// Classify a failed write, separating uniqueness violations from
    /// other constraint failures and plain SQLite errors.
    pub(crate) fn from_write(err: rusqlite::Error, what: &str) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, ref detail) = err {
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            {
                return DbError::Duplicate(what.to_string());
            }
            if failure.code == rusqlite::ErrorCode::ConstraintViolation {
                return DbError::Constraint(
                    detail.clone().unwrap_or_else(|| what.to_string()),
                );
            }
        }
        DbError::Sqlite(err)
    }

    /// True for a uniqueness violation.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DbError::Duplicate(_))
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the database at the given path.
///
/// Switches the file to WAL mode, configures the connection and runs any
/// pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure per-connection pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -8000;",
    )?;
    Ok(())
}

/// Handle to the shared database file.
///
/// Cheap to clone. Every request calls [`Database::connect`] and owns the
/// resulting connection for the duration of its statement batch, so no
/// operation serializes the whole process.
#[derive(Clone, Debug)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Open (creating and migrating if needed) the database file.
    pub fn open(path: &Path) -> Result<Self> {
        open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// A fresh, configured connection scoped to the caller.
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        configure(&conn)?;
        Ok(conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
