//! SQLite-backed store for the casework engine.
//!
//! Operations are grouped by entity:
//!
//! - `catalog_ops`: task templates and the user directory
//! - `edge_ops`: dependency edges, including the write-locked [`EdgeWriter`]
//! - `instance_ops`: family task instances and their status updates
//! - `rule_ops`: workflow rules and the rule-firing ledger

mod catalog_ops;
mod edge_ops;
mod instance_ops;
mod rule_ops;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use rusqlite::types::Type;
use tracing::info;

use crate::{Result, StoreError};

pub use instance_ops::TemplateRow;
pub use edge_ops::EdgeWriter;
pub use rule_ops::{FiringOutcome, RuleFiring};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// How long a writer waits on another connection's lock before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Thin repository over SQLite for catalog, graph, instance and rule data.
///
/// Thread-safe via an internal `Mutex<Connection>`. Multi-statement writes
/// run in `BEGIN IMMEDIATE` transactions so they also serialize against
/// other connections to the same database file.
pub struct CaseworkStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for CaseworkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseworkStore").finish_non_exhaustive()
    }
}

impl CaseworkStore {
    /// Open (or create) the database at `path` and run pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open with an explicit busy timeout for contended writes.
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(busy_timeout)?;

        let mut store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        info!(path = %path.display(), "Casework store opened");
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let mut store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&mut self) -> Result<()> {
        let conn = self.conn.get_mut();
        embedded::migrations::runner()
            .run(conn)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Lock the connection for use.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Read a TEXT column into one of the closed domain enums.
fn get_enum<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = casework_types::ParseEnumError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn get_opt_enum<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = casework_types::ParseEnumError>,
{
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => raw.parse().map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        }),
        None => Ok(None),
    }
}

/// Collect a mapped-rows iterator, surfacing enum conversion failures as `Corrupt`.
fn collect_rows<T>(
    iter: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in iter {
        out.push(row.map_err(corrupt_or_db)?);
    }
    Ok(out)
}

fn corrupt_or_db(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::FromSqlConversionFailure(_, _, inner) => {
            StoreError::Corrupt(inner.to_string())
        }
        other => StoreError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run() {
        let _store = CaseworkStore::open_in_memory().expect("failed to open in-memory store");
    }

    #[test]
    fn test_open_on_disk_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("casework.db");
        let _store = CaseworkStore::open(&path).unwrap();
        assert!(path.exists());

        // Reopening runs migrations idempotently.
        let _again = CaseworkStore::open(&path).unwrap();
    }
}
