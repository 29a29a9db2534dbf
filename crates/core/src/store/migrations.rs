//! Schema versioning for the SQLite session store.
//!
//! The applied version lives in SQLite's `user_version` header field rather
//! than a bookkeeping table: entries never outlive a session, so the only
//! history worth keeping is which schema the file is at. Each step runs in
//! its own transaction together with the version bump.

use super::Error;
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::{self, TransactionBehavior};

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

/// Schema steps, ascending by version.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "session_entries",
    sql: include_str!("../../migrations/001_session_entries.sql"),
}];

/// Newest schema version this build knows.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// The schema version recorded in the database header.
pub async fn current_version(conn: &Connection) -> Result<u32, Error> {
    conn.call(|conn| conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0)))
        .await
        .map_err(Error::Database)
}

/// Bring the schema up to [`latest_version`].
///
/// # Errors
///
/// Returns `Error::MigrationFailed` when the file was written by a newer
/// schema or a step fails; a failed step leaves the previous version intact.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if current > latest_version() {
            return Err(Error::MigrationFailed(format!(
                "database schema v{current} is newer than supported v{}",
                latest_version()
            )));
        }

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            apply(conn, migration)
                .map_err(|e| Error::MigrationFailed(format!("v{} {}: {e}", migration.version, migration.name)))?;
            tracing::debug!(version = migration.version, name = migration.name, "applied session store migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

fn apply(conn: &mut rusqlite::Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute_batch(migration.sql)?;
    tx.pragma_update(None, "user_version", migration.version)?;
    tx.commit()
}
