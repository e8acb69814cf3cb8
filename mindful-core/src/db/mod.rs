//! SQLite persistence and the operations built on it.
//!
//! Every mutating operation runs its checks and writes inside one
//! `BEGIN IMMEDIATE` transaction. The UNIQUE constraints in [`schema`] back
//! up the application-level checks.

mod diary;
mod enrollments;
mod programs;
mod questionnaires;
pub mod schema;
mod sessions;
mod stats;
mod users;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use directories::ProjectDirs;
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

use crate::error::CoreResult;

/// Shared handle to the application database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        tracing::debug!(path = %path.display(), "opening database");
        Self::from_connection(Connection::open(path)?)
    }

    /// Open the database in the platform data directory.
    pub fn open_default() -> CoreResult<Self> {
        Self::open(default_path()?)
    }

    /// Open a private in-memory database.
    pub fn open_memory() -> CoreResult<Self> {
        let db = Self::from_connection(Connection::open_in_memory()?)?;
        db.migrate()?;
        Ok(db)
    }

    fn from_connection(conn: Connection) -> CoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> CoreResult<()> {
        self.with_connection(|conn| {
            conn.execute_batch(schema::SCHEMA)?;
            Ok(())
        })
    }

    /// Run `f` against the connection without a transaction.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> CoreResult<T>) -> CoreResult<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside an immediate transaction; commit on `Ok`, roll back on `Err`.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// `<data dir>/mindful.db` for the current platform.
pub fn default_path() -> CoreResult<PathBuf> {
    let dirs = ProjectDirs::from("org", "mindful", "mindful")
        .ok_or_else(|| io::Error::other("could not determine a data directory"))?;
    Ok(dirs.data_dir().join("mindful.db"))
}

// Column helpers. Timestamps are stored as fixed-width RFC 3339 text so they
// sort lexically; ids as hyphenated UUID text.

pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    col: &str,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    let err = err.into();
    tracing::error!(column = col, error = %err, "unreadable column");
    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, err)
}

pub(crate) fn col_uuid(row: &Row<'_>, col: &str) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(col)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(col, e))
}

pub(crate) fn col_opt_uuid(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(col)?;
    raw.map(|r| Uuid::parse_str(&r).map_err(|e| conversion_error(col, e)))
        .transpose()
}

pub(crate) fn col_ts(row: &Row<'_>, col: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(col)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(col, e))
}

pub(crate) fn col_opt_ts(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(col)?;
    raw.map(|r| {
        DateTime::parse_from_rfc3339(&r)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(col, e))
    })
    .transpose()
}

pub(crate) fn col_enum<T>(
    row: &Row<'_>,
    col: &str,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(col)?;
    parse(&raw).ok_or_else(|| conversion_error(col, format!("unknown value {raw:?}")))
}

pub(crate) fn col_json(row: &Row<'_>, col: &str) -> rusqlite::Result<serde_json::Value> {
    let raw: String = row.get(col)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(col, e))
}

pub(crate) fn invalid_column(col: &str, err: impl ToString) -> rusqlite::Error {
    conversion_error(col, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_schema_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mindful.db");

        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        db.migrate().unwrap();

        let tables: i64 = db
            .with_connection(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(tables, 9);
        assert!(path.exists());
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let db = Database::open_memory().unwrap();
        let result: CoreResult<()> = db.transaction(|tx| {
            tx.execute(
                "INSERT INTO users (id, username, email, role, created_at)
                 VALUES ('u1', 'ana', 'ana@example.org', 'admin', '2026-01-01T00:00:00Z')",
                [],
            )?;
            Err(crate::error::CoreError::validation("abort"))
        });
        assert!(result.is_err());

        let users: i64 = db
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(users, 0);
    }

    #[test]
    fn timestamps_round_trip_through_text() {
        let now = Utc::now();
        let text = ts(&now);
        let parsed = DateTime::parse_from_rfc3339(&text).unwrap().with_timezone(&Utc);
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }
}
