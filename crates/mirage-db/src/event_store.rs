//! Event store operations.
//!
//! Events are the source of truth for the simulation's history. Every
//! state change produces an immutable row in the `events` table; replay
//! reads back `ACTION_SUBMITTED` rows per tick and the highest
//! `TICK_RESOLVED` tick to rebuild the world from the latest snapshot.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use mirage_types::AgentId;

use crate::error::DbError;

/// Operations on the `events` table.
pub struct EventStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EventStore<'a> {
    /// Create a new event store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one event; returns the assigned row id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the insert fails.
    pub async fn insert(
        &self,
        tick: u64,
        event_type: &str,
        agent_id: Option<&AgentId>,
        payload: &serde_json::Value,
    ) -> Result<i64, DbError> {
        let result = sqlx::query(
            r"INSERT INTO events (tick, type, agent_id, payload_json, created_at)
              VALUES (?, ?, ?, ?, ?)",
        )
        .bind(i64::try_from(tick).unwrap_or(i64::MAX))
        .bind(event_type)
        .bind(agent_id.map(AgentId::as_str))
        .bind(payload.to_string())
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// The most recent events, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<EventRow>, DbError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT id, tick, type, agent_id, payload_json, created_at
              FROM events
              ORDER BY id DESC
              LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// All `ACTION_SUBMITTED` events targeting `tick`, in insertion order.
    ///
    /// Insertion order matters: replay buckets these by agent with
    /// last-write-wins semantics, mirroring the pending-slot overwrite.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn actions_for_tick(&self, tick: u64) -> Result<Vec<EventRow>, DbError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT id, tick, type, agent_id, payload_json, created_at
              FROM events
              WHERE tick = ? AND type = 'ACTION_SUBMITTED'
              ORDER BY id ASC",
        )
        .bind(i64::try_from(tick).unwrap_or(i64::MAX))
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// The highest tick with a `TICK_RESOLVED` event, or 0 when none exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn max_resolved_tick(&self) -> Result<u64, DbError> {
        let max: Option<i64> = sqlx::query_scalar(
            r"SELECT MAX(tick) FROM events WHERE type = 'TICK_RESOLVED'",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(max.and_then(|t| u64::try_from(t).ok()).unwrap_or(0))
    }

    /// Delete every event row (used by the full world reset).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the delete fails.
    pub async fn clear(&self) -> Result<(), DbError> {
        sqlx::query(r"DELETE FROM events").execute(self.pool).await?;
        Ok(())
    }

    /// Number of events of the given type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn count_of_type(&self, event_type: &str) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar(r"SELECT COUNT(*) FROM events WHERE type = ?")
            .bind(event_type)
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}

/// A row from the `events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Auto-incremented event id.
    pub id: i64,
    /// The tick this event belongs to.
    pub tick: i64,
    /// Event type string.
    #[sqlx(rename = "type")]
    pub event_type: String,
    /// Primary agent involved, if any.
    pub agent_id: Option<String>,
    /// JSON payload as stored.
    pub payload_json: String,
    /// Real-world timestamp.
    pub created_at: DateTime<Utc>,
}

impl EventRow {
    /// Parse the stored payload into a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if the stored text is not valid
    /// JSON.
    pub fn payload(&self) -> Result<serde_json::Value, DbError> {
        Ok(serde_json::from_str(&self.payload_json)?)
    }
}
