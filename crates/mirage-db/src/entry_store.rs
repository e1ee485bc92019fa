//! Payment entry records.
//!
//! Append-only log of accepted session entries: the opaque payment
//! reference, the minted agent, and the quoted price at entry time.

use chrono::Utc;
use sqlx::SqlitePool;

use mirage_types::AgentId;

use crate::error::DbError;

/// Operations on the `entries` table.
pub struct EntryStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EntryStore<'a> {
    /// Create a new entry store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Record one accepted entry.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the insert fails.
    pub async fn insert(
        &self,
        tx_ref: &str,
        agent_id: &AgentId,
        paid_asset: &str,
        paid_amount: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO entries (tx_ref, agent_id, paid_asset, paid_amount, created_at)
              VALUES (?, ?, ?, ?, ?)",
        )
        .bind(tx_ref)
        .bind(agent_id.as_str())
        .bind(paid_asset)
        .bind(paid_amount)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete every entry row (used by the full world reset).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the delete fails.
    pub async fn clear(&self) -> Result<(), DbError> {
        sqlx::query(r"DELETE FROM entries").execute(self.pool).await?;
        Ok(())
    }
}
