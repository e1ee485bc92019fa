//! The per-agent observation payload.
//!
//! An observation is a consistent snapshot taken under the world lock: the
//! tiles within the configured Chebyshev radius of the caller, the other
//! alive agents (split into nearby and global views), and the market price.
//! Dead callers receive the frame with empty tile and agent lists.

use serde::{Deserialize, Serialize};

use crate::ids::AgentId;
use crate::structs::Agent;

/// One tile as seen by an observing agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileView {
    /// Horizontal position of the tile.
    pub x: i32,
    /// Vertical position of the tile.
    pub y: i32,
    /// Environmental wear in `[0, 1]`.
    pub degradation: f64,
    /// Extractable yield in `[0, 100]`.
    pub resource: u32,
    /// Danger level in `[0, 1]`.
    pub hazard: f64,
}

/// Another agent as seen by an observing agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentGlimpse {
    /// The observed agent's identifier.
    pub agent_id: AgentId,
    /// Horizontal position.
    pub x: i32,
    /// Vertical position.
    pub y: i32,
    /// Hit points.
    pub hp: i32,
    /// Trust score rounded to 1 decimal.
    pub trust_score: f64,
}

/// The full observation served to an authenticated agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// The current world tick.
    pub tick: u64,
    /// The Chebyshev radius the tile window covers.
    pub radius: i32,
    /// The caller's own full state.
    pub agent: Agent,
    /// In-bounds tiles within the radius; empty for dead callers.
    pub tiles: Vec<TileView>,
    /// Other alive agents within the radius; empty for dead callers.
    pub nearby_agents: Vec<AgentGlimpse>,
    /// All other alive agents; empty for dead callers.
    pub all_agents: Vec<AgentGlimpse>,
    /// Number of alive agents in the world.
    pub alive_agents: usize,
    /// Current market price rounded to 3 decimals.
    pub market_price: f64,
}
