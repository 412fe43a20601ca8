//! Job tracking database.
//!
//! Jobs exist for observability only: the orchestrator records lifecycle
//! transitions here but never consults them for correctness.

mod jobs;
mod migrations;
pub mod models;

pub use models::{Job, JobStatus};

use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{DatabaseError, ServiceError, ServiceResult};

/// SQLite-backed job store
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> ServiceResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ServiceError::Internal {
                message: format!("failed to create database directory: {e}"),
            })?;
        }

        let conn = Connection::open(path).map_err(DatabaseError::Connection)?;

        // WAL for readers concurrent with job updates
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(DatabaseError::Query)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(DatabaseError::Query)?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database for tests
    #[cfg(test)]
    pub fn open_in_memory() -> ServiceResult<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::Connection)?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}
