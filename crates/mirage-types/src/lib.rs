//! Shared type definitions for the Mirage simulation.
//!
//! This crate is the single source of truth for all types used across the
//! Mirage workspace: identifiers, agent actions, persisted event types, and
//! the observation payloads served to agents.
//!
//! # Modules
//!
//! - [`ids`] -- Opaque string identifiers for agents and API tokens
//! - [`actions`] -- The tagged action variants agents submit each tick
//! - [`events`] -- Event types, typed payload structs, and the wire event record
//! - [`structs`] -- Core entity structs (tiles, agents, trade records)
//! - [`observation`] -- The per-agent observation payload

pub mod actions;
pub mod events;
pub mod ids;
pub mod observation;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use actions::Action;
pub use events::{
    ActionRejectedDetails, AgentDamagedDetails, AgentDiedDetails, AgentEnteredDetails,
    AgentMovedDetails, AgentRestedDetails, BetrayalDetectedDetails, CombatHitDetails,
    CombatKillDetails, EventType, MarketPriceUpdatedDetails, RejectReason,
    ReputationChangedDetails, ReputationReason, ResourceGatheredDetails, StateAnchoredDetails,
    TradeCompletedDetails, WorldEvent, round1, round2, round3,
};
pub use ids::{AgentId, ApiKey};
pub use observation::{AgentGlimpse, Observation, TileView};
pub use structs::{
    Agent, MAX_HP, NEUTRAL_TRUST, RESOURCE_KEY, RecentTrade, TRADE_HISTORY_CAP, Tile, TradeRecord,
    TradeRole,
};
