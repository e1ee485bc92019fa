//! Event types, typed payload structs, and the wire event record.
//!
//! Every state change in the simulation produces an immutable event. Events
//! are the source of truth -- the world can be reconstructed by replaying
//! `ACTION_SUBMITTED` events through a snapshot. Payloads are carried as
//! JSON built from the typed details structs below, flattened into the
//! event record so the persisted shape stays flat:
//!
//! ```json
//! {"type":"AGENT_MOVED","tick":12,"agent_id":"...","x":9,"y":10}
//! ```

use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// The category of a persisted simulation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// The server booted and recovered its world.
    WorldStarted,
    /// A session entry found the world extinct and regenerated it.
    WorldResetIfExtinct,
    /// An operator reset the world to tick 0.
    WorldReset,
    /// A new agent joined the world.
    AgentEntered,
    /// An agent queued an action for a future tick.
    ActionSubmitted,
    /// A tick fully resolved; payload bundles the drained actions and events.
    TickResolved,
    /// An agent moved to a new tile.
    AgentMoved,
    /// An agent extracted resource from its tile.
    ResourceGathered,
    /// An agent rested and recovered a hit point.
    AgentRested,
    /// A resource transfer between two agents completed.
    TradeCompleted,
    /// An attack landed.
    CombatHit,
    /// An attack killed its target.
    CombatKill,
    /// An attack targeted a recent trade partner.
    BetrayalDetected,
    /// An agent's trust score changed.
    ReputationChanged,
    /// Environmental hazard damaged an agent.
    AgentDamaged,
    /// An agent's hit points reached zero.
    AgentDied,
    /// The market price moved by more than the reporting threshold.
    MarketPriceUpdated,
    /// A canonical state hash was computed for external attestation.
    StateAnchored,
    /// Trailing marker closing a tick's event stream.
    TickDone,
    /// An action failed validation; the payload names the reason.
    ActionRejected,
    /// Training telemetry uploaded by a learning agent harness.
    DqnLog,
    /// An operator finalized a round with its list of survivors.
    GameFinalized,
}

impl EventType {
    /// The persisted string form of this event type.
    ///
    /// Matches the serde representation; used for the `type` column of the
    /// events table and for replay filters.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorldStarted => "WORLD_STARTED",
            Self::WorldResetIfExtinct => "WORLD_RESET_IF_EXTINCT",
            Self::WorldReset => "WORLD_RESET",
            Self::AgentEntered => "AGENT_ENTERED",
            Self::ActionSubmitted => "ACTION_SUBMITTED",
            Self::TickResolved => "TICK_RESOLVED",
            Self::AgentMoved => "AGENT_MOVED",
            Self::ResourceGathered => "RESOURCE_GATHERED",
            Self::AgentRested => "AGENT_RESTED",
            Self::TradeCompleted => "TRADE_COMPLETED",
            Self::CombatHit => "COMBAT_HIT",
            Self::CombatKill => "COMBAT_KILL",
            Self::BetrayalDetected => "BETRAYAL_DETECTED",
            Self::ReputationChanged => "REPUTATION_CHANGED",
            Self::AgentDamaged => "AGENT_DAMAGED",
            Self::AgentDied => "AGENT_DIED",
            Self::MarketPriceUpdated => "MARKET_PRICE_UPDATED",
            Self::StateAnchored => "STATE_ANCHORED",
            Self::TickDone => "TICK_DONE",
            Self::ActionRejected => "ACTION_REJECTED",
            Self::DqnLog => "DQN_LOG",
            Self::GameFinalized => "GAME_FINALIZED",
        }
    }
}

/// Why an action was rejected instead of applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The move was not a unit step, or the destination is out of bounds.
    InvalidMove,
    /// The tile under the agent has no resource left.
    NoResource,
    /// The trade amount was non-positive or exceeds the initiator's stock.
    InsufficientResource,
    /// The trade target does not exist, is dead, or is the initiator.
    InvalidTradeTarget,
    /// The attack target does not exist, is dead, or is the initiator.
    InvalidAttackTarget,
    /// The attack target is further than Manhattan distance 1.
    TargetNotAdjacent,
    /// The action type is not recognized.
    UnknownAction,
}

/// Why an agent's trust score changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationReason {
    /// Both parties of a completed trade gain trust.
    SuccessfulTrade,
    /// Attacking a recent trade partner costs heavily.
    Betrayal,
    /// Ordinary combat costs a little trust.
    Combat,
}

/// A single simulation event in its wire form.
///
/// `details` is flattened, so the serialized record carries the payload
/// fields at the top level next to `type`, `tick`, and `agent_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEvent {
    /// The category of event.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// The tick when this event occurred.
    pub tick: u64,
    /// The primary agent involved, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub agent_id: Option<AgentId>,
    /// Type-specific payload serialized as a JSON object.
    #[serde(flatten)]
    pub details: serde_json::Value,
}

impl WorldEvent {
    /// Build an event from a typed details struct.
    ///
    /// Serialization of the details structs in this module cannot fail; if a
    /// caller supplies a non-object payload it degrades to an empty object
    /// rather than poisoning the event stream.
    pub fn new<T: Serialize>(
        tick: u64,
        event_type: EventType,
        agent_id: Option<AgentId>,
        details: &T,
    ) -> Self {
        let details = match serde_json::to_value(details) {
            Ok(serde_json::Value::Object(map)) => serde_json::Value::Object(map),
            _ => serde_json::Value::Object(serde_json::Map::new()),
        };
        Self {
            event_type,
            tick,
            agent_id,
            details,
        }
    }

    /// Build an event with an empty payload (e.g. `TICK_DONE`).
    pub fn bare(tick: u64, event_type: EventType) -> Self {
        Self {
            event_type,
            tick,
            agent_id: None,
            details: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed event payloads
// ---------------------------------------------------------------------------

/// Payload of `AGENT_ENTERED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEnteredDetails {
    /// The agent that joined.
    pub agent_id: AgentId,
    /// Display name (falls back to the agent id).
    pub name: String,
    /// Whether this agent was minted by the demo spawner.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub demo: Option<bool>,
}

/// Payload of `AGENT_MOVED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMovedDetails {
    /// New horizontal position.
    pub x: i32,
    /// New vertical position.
    pub y: i32,
}

/// Payload of `RESOURCE_GATHERED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGatheredDetails {
    /// Units extracted (always 1 per gather).
    pub amount: u64,
}

/// Payload of `AGENT_RESTED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRestedDetails {
    /// Hit points after resting.
    pub hp: i32,
}

/// Payload of `TRADE_COMPLETED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeCompletedDetails {
    /// The receiving agent.
    pub target_id: AgentId,
    /// Units transferred.
    pub amount: u64,
    /// Market price at resolution time, rounded to 3 decimals.
    pub market_price: f64,
    /// `amount * market_price`, rounded to 2 decimals.
    pub trade_value: f64,
}

/// Payload of `COMBAT_HIT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatHitDetails {
    /// The struck agent.
    pub target_id: AgentId,
    /// Damage dealt to the target.
    pub damage: i32,
    /// Attacker hit points after the stamina cost.
    pub attacker_hp: i32,
    /// Target hit points after the hit (may be negative before clamping).
    pub target_hp: i32,
    /// Whether the hit was a betrayal of a recent trade partner.
    pub is_betrayal: bool,
}

/// Payload of `COMBAT_KILL`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatKillDetails {
    /// The killed agent.
    pub target_id: AgentId,
    /// Resource units looted from the victim (half its stock).
    pub loot: u64,
}

/// Payload of `BETRAYAL_DETECTED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetrayalDetectedDetails {
    /// The attacker.
    pub betrayer_id: AgentId,
    /// The attacked trade partner.
    pub victim_id: AgentId,
    /// The attacker's lifetime betrayal count after this one.
    pub total_betrayals: u32,
}

/// Payload of `REPUTATION_CHANGED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationChangedDetails {
    /// Trust score before the change, rounded to 1 decimal.
    pub old_score: f64,
    /// Trust score after the change, rounded to 1 decimal.
    pub new_score: f64,
    /// Applied delta, rounded to 1 decimal.
    pub change: f64,
    /// Why the score changed.
    pub reason: ReputationReason,
}

/// Payload of `AGENT_DAMAGED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDamagedDetails {
    /// Hit points lost to the hazard.
    pub amount: i32,
}

/// Payload of `AGENT_DIED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDiedDetails {
    /// Horizontal position at death.
    pub x: i32,
    /// Vertical position at death.
    pub y: i32,
}

/// Payload of `MARKET_PRICE_UPDATED`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketPriceUpdatedDetails {
    /// Price before recomputation, rounded to 3 decimals.
    pub old_price: f64,
    /// Price after recomputation, rounded to 3 decimals.
    pub new_price: f64,
}

/// Payload of `STATE_ANCHORED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAnchoredDetails {
    /// Lowercase hex SHA-256 of the canonical state projection.
    pub state_hash: String,
    /// Number of alive agents at anchor time.
    pub alive_agents: usize,
}

/// Payload of `ACTION_REJECTED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRejectedDetails {
    /// Why the action was rejected.
    pub reason: RejectReason,
}

// ---------------------------------------------------------------------------
// Payload rounding
// ---------------------------------------------------------------------------

/// Round to 1 decimal place (trust scores in payloads).
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to 2 decimal places (trade values, anchored trust).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to 3 decimal places (market prices in payloads).
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
