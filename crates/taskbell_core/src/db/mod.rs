//! SQLite bootstrap for the `kv_entries` blob table.
//!
//! # Responsibility
//! - Hand out connections whose `kv_entries` schema is current.
//! - Offer a read-only open for inspection tools that must not write.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - Writable opens migrate before returning; read-only opens never migrate
//!   and refuse a database that would need it.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, open_db_read_only};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or migrating the blob database.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// File was written by a newer build; its blobs may not decode.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Read-only open found a schema that still needs migrations.
    NotMigrated {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "task database schema v{db_version} is newer than this build (v{latest_supported})"
            ),
            Self::NotMigrated {
                db_version,
                latest_supported,
            } => write!(
                f,
                "task database schema v{db_version} needs migration to v{latest_supported}; open it writable first"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::NotMigrated { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
