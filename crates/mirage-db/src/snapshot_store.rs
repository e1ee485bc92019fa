//! World snapshot persistence.
//!
//! One row per tick, holding the full serialized world. Snapshots are the
//! starting points for event replay: recovery loads the newest row and
//! replays `ACTION_SUBMITTED` events from there.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DbError;

/// Operations on the `world_snapshots` table.
pub struct SnapshotStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SnapshotStore<'a> {
    /// Create a new snapshot store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the snapshot for `tick` (idempotent).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the upsert fails.
    pub async fn upsert(&self, tick: u64, state_json: &str) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO world_snapshots (tick, state_json, created_at)
              VALUES (?, ?, ?)
              ON CONFLICT(tick) DO UPDATE SET
                state_json = excluded.state_json,
                created_at = excluded.created_at",
        )
        .bind(i64::try_from(tick).unwrap_or(i64::MAX))
        .bind(state_json)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        tracing::debug!(tick, "World snapshot stored");
        Ok(())
    }

    /// The newest snapshot, or `None` before the first write.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn latest(&self) -> Result<Option<SnapshotRow>, DbError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r"SELECT tick, state_json, created_at
              FROM world_snapshots
              ORDER BY tick DESC
              LIMIT 1",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// The snapshot for a specific tick, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn get(&self, tick: u64) -> Result<Option<SnapshotRow>, DbError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r"SELECT tick, state_json, created_at
              FROM world_snapshots
              WHERE tick = ?",
        )
        .bind(i64::try_from(tick).unwrap_or(i64::MAX))
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Delete every snapshot (used by the full world reset).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the delete fails.
    pub async fn clear(&self) -> Result<(), DbError> {
        sqlx::query(r"DELETE FROM world_snapshots")
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

/// A row from the `world_snapshots` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    /// The tick this snapshot captures.
    pub tick: i64,
    /// Full serialized world state.
    pub state_json: String,
    /// Real-world timestamp.
    pub created_at: DateTime<Utc>,
}
