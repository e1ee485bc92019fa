//! `SQLite` connection management and schema bootstrap.
//!
//! The pool is capped at one connection: every access already runs under
//! the server's `db_lock`, and a single connection keeps `:memory:`
//! databases alive for the whole test. WAL journaling with normal
//! synchronous mode matches the write pattern (many small appends, one
//! reader).

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::agent_store::AgentStore;
use crate::entry_store::EntryStore;
use crate::error::DbError;
use crate::event_store::EventStore;
use crate::snapshot_store::SnapshotStore;

/// Handle to the `SQLite` database.
///
/// Cheap to clone; store structs borrow the pool per operation.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at `path`.
    ///
    /// Pass `":memory:"` for an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the path is invalid or the
    /// connection fails.
    pub async fn connect(path: &str) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Create the schema if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if any statement fails.
    pub async fn init(&self) -> Result<(), DbError> {
        let statements = [
            r"CREATE TABLE IF NOT EXISTS agents (
                agent_id TEXT PRIMARY KEY,
                api_key TEXT NOT NULL,
                state_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            r"CREATE TABLE IF NOT EXISTS entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tx_ref TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                paid_asset TEXT NOT NULL,
                paid_amount TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            r"CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tick INTEGER NOT NULL,
                type TEXT NOT NULL,
                agent_id TEXT,
                payload_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            r"CREATE TABLE IF NOT EXISTS world_snapshots (
                tick INTEGER PRIMARY KEY,
                state_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        ];
        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("Database schema initialized");
        Ok(())
    }

    /// The underlying connection pool.
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Operations on the `events` table.
    pub const fn events(&self) -> EventStore<'_> {
        EventStore::new(&self.pool)
    }

    /// Operations on the `world_snapshots` table.
    pub const fn snapshots(&self) -> SnapshotStore<'_> {
        SnapshotStore::new(&self.pool)
    }

    /// Operations on the `agents` table.
    pub const fn agents(&self) -> AgentStore<'_> {
        AgentStore::new(&self.pool)
    }

    /// Operations on the `entries` table.
    pub const fn entries(&self) -> EntryStore<'_> {
        EntryStore::new(&self.pool)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_is_idempotent() {
        let db = Database::connect(":memory:").await.unwrap();
        db.init().await.unwrap();
        db.init().await.unwrap();
    }
}
