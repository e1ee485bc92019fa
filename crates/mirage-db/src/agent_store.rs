//! Agent credentials and persisted state.
//!
//! One row per agent: the opaque id, the API token used for bearer
//! authentication, and the latest serialized agent state. Rows are
//! refreshed at the end of every tick, so after recovery they carry each
//! agent's newest persisted state.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use mirage_types::{AgentId, ApiKey};

use crate::error::DbError;

/// Operations on the `agents` table.
pub struct AgentStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AgentStore<'a> {
    /// Create a new agent store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or refresh an agent row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the upsert fails.
    pub async fn upsert(
        &self,
        agent_id: &AgentId,
        api_key: &ApiKey,
        state_json: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO agents (agent_id, api_key, state_json, created_at)
              VALUES (?, ?, ?, ?)
              ON CONFLICT(agent_id) DO UPDATE SET
                api_key = excluded.api_key,
                state_json = excluded.state_json",
        )
        .bind(agent_id.as_str())
        .bind(api_key.as_str())
        .bind(state_json)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Look up an agent by API token.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn get_by_token(&self, api_key: &str) -> Result<Option<AgentRow>, DbError> {
        let row = sqlx::query_as::<_, AgentRow>(
            r"SELECT agent_id, api_key, state_json, created_at
              FROM agents
              WHERE api_key = ?
              LIMIT 1",
        )
        .bind(api_key)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// The API key for an agent, if the agent has a row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn api_key_of(&self, agent_id: &AgentId) -> Result<Option<String>, DbError> {
        let key: Option<String> = sqlx::query_scalar(
            r"SELECT api_key FROM agents WHERE agent_id = ? LIMIT 1",
        )
        .bind(agent_id.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(key)
    }

    /// Every agent row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn list(&self) -> Result<Vec<AgentRow>, DbError> {
        let rows = sqlx::query_as::<_, AgentRow>(
            r"SELECT agent_id, api_key, state_json, created_at FROM agents",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Delete every agent row (used by the full world reset).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the delete fails.
    pub async fn clear(&self) -> Result<(), DbError> {
        sqlx::query(r"DELETE FROM agents").execute(self.pool).await?;
        Ok(())
    }
}

/// A row from the `agents` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AgentRow {
    /// The agent's opaque identifier.
    pub agent_id: String,
    /// The agent's API token.
    pub api_key: String,
    /// Latest serialized agent state.
    pub state_json: String,
    /// Real-world timestamp of first registration.
    pub created_at: DateTime<Utc>,
}
