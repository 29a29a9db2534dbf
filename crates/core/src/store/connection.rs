//! SQLite session store.
//!
//! Opens the database, applies pragmas for WAL-mode access, runs migrations
//! and then starts a fresh session by emptying `session_entries`. Entries
//! therefore never outlive the session that wrote them, even when the file
//! survives a restart.

use super::{SessionStore, migrations};
use crate::Error;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::Path;
use tokio_rusqlite::rusqlite::OptionalExtension;
use tokio_rusqlite::{Connection, params};

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Snapshot of the current session's entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub entries: u64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Fixed-width RFC 3339 so `stored_at` orders correctly as text.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>, Error> {
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|e| Error::Serialization(format!("bad stored_at {raw:?}: {e}")))
    })
    .transpose()
}

/// Session store handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pub(crate) conn: Connection,
}

impl SqliteStore {
    /// Open a store at the specified path and begin a new session.
    ///
    /// Creates the file if it doesn't exist. Entries left by an earlier
    /// session are discarded.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Open an in-memory store.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        let discarded = conn
            .call(|conn| conn.execute("DELETE FROM session_entries", []))
            .await
            .map_err(Error::Database)?;
        if discarded > 0 {
            tracing::debug!(discarded, "started new session, dropped previous entries");
        }

        Ok(Self { conn })
    }

    /// Number of entries in the current session.
    pub async fn len(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM session_entries", [], |row| row.get::<_, i64>(0)))
            .await
            .map(|count| count as u64)
            .map_err(Error::Database)
    }

    /// Whether the current session holds no entries.
    pub async fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len().await? == 0)
    }

    /// Entry count and the write times of the oldest and newest entries.
    pub async fn stats(&self) -> Result<StoreStats, Error> {
        let (entries, oldest, newest) = self
            .conn
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*), MIN(stored_at), MAX(stored_at) FROM session_entries",
                    [],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?, row.get::<_, Option<String>>(2)?)),
                )
            })
            .await
            .map_err(Error::Database)?;

        Ok(StoreStats { entries: entries as u64, oldest: parse_timestamp(oldest)?, newest: parse_timestamp(newest)? })
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let value = conn
                    .query_row("SELECT value FROM session_entries WHERE key = ?1", params![key], |row| {
                        row.get(0)
                    })
                    .optional()?;
                Ok(value)
            })
            .await
            .map_err(Error::from)
    }

    async fn set_raw(&self, key: &str, value: &str) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        let stored_at = timestamp(Utc::now());

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO session_entries (key, value, stored_at)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        stored_at = excluded.stored_at",
                    params![key, value, stored_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM session_entries WHERE key = ?1", params![key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn clear_prefix(&self, prefix: &str) -> Result<u64, Error> {
        let prefix = prefix.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM session_entries WHERE substr(key, 1, length(?1)) = ?1",
                    params![prefix],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
