//! Core entity structs: tiles, agents, and trade records.
//!
//! These are plain data carriers; the behavior that mutates them lives in
//! the world and resolver crates. All collections use deterministic
//! orderings (`BTreeMap`, insertion-ordered `VecDeque`) because the structs
//! are serialized into snapshots that must replay bit-identically.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::ids::AgentId;

/// The inventory key under which gatherable resource is tracked.
///
/// The inventory is an open mapping for forward compatibility, but only
/// this key is recognized by the engine.
pub const RESOURCE_KEY: &str = "resource";

/// Maximum agent hit points.
pub const MAX_HP: i32 = 20;

/// Neutral trust score that reputation decays toward.
pub const NEUTRAL_TRUST: f64 = 100.0;

/// Cap on each agent's retained trade history.
pub const TRADE_HISTORY_CAP: usize = 50;

/// One cell of the world grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    /// Environmental wear in `[0, 1]`; only ever increases within a session.
    pub degradation: f64,
    /// Extractable yield in `[0, 100]`.
    pub resource: u32,
    /// Danger level in `[0, 1]`.
    pub hazard: f64,
}

/// Which side of a trade an agent was on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeRole {
    /// The initiating agent that gave resources away.
    Giver,
    /// The agent that received resources.
    Receiver,
}

/// One entry in an agent's bounded trade history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// The tick the trade resolved on.
    pub tick: u64,
    /// The other party.
    pub partner: AgentId,
    /// Units transferred.
    pub amount: u64,
    /// Market value of the transfer, rounded to 2 decimals.
    pub value: f64,
    /// Whether this agent gave or received.
    pub role: TradeRole,
}

/// One entry in the world's recent-trade window used for betrayal detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentTrade {
    /// The tick the trade resolved on.
    pub tick: u64,
    /// The initiating agent.
    pub agent_id: AgentId,
    /// The receiving agent.
    pub target_id: AgentId,
    /// Units transferred.
    pub amount: u64,
}

/// A participant in the simulation.
///
/// Dead agents persist as read-only tombstones until the next world reset;
/// `alive` transitions to `false` exactly once, when `hp` reaches 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Opaque unique identifier.
    pub agent_id: AgentId,
    /// Optional display name, set at session entry.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    /// Optional payment wallet address, set at chain-mode session entry.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub wallet_address: Option<String>,
    /// Horizontal position inside grid bounds.
    pub x: i32,
    /// Vertical position inside grid bounds.
    pub y: i32,
    /// Hit points in `[0, 20]`.
    pub hp: i32,
    /// Inventory mapping resource name to a non-negative count.
    pub inventory: BTreeMap<String, u64>,
    /// Whether the agent is alive and actionable.
    pub alive: bool,
    /// Reputation in `[0, 100]`, starting at the neutral 100.
    pub trust_score: f64,
    /// Bounded history of this agent's trades (most recent last).
    #[serde(default)]
    pub trade_history: VecDeque<TradeRecord>,
    /// Lifetime count of betrayals committed.
    #[serde(default)]
    pub betrayals: u32,
    /// Identifiers of current allies.
    #[serde(default)]
    pub alliances: Vec<AgentId>,
}

impl Agent {
    /// Create an alive agent at the given position with full vitals.
    pub fn spawn(agent_id: AgentId, x: i32, y: i32) -> Self {
        let mut inventory = BTreeMap::new();
        inventory.insert(RESOURCE_KEY.to_owned(), 0);
        Self {
            agent_id,
            name: None,
            wallet_address: None,
            x,
            y,
            hp: MAX_HP,
            inventory,
            alive: true,
            trust_score: NEUTRAL_TRUST,
            trade_history: VecDeque::new(),
            betrayals: 0,
            alliances: Vec::new(),
        }
    }

    /// The agent's current resource count.
    pub fn resource(&self) -> u64 {
        self.inventory.get(RESOURCE_KEY).copied().unwrap_or(0)
    }

    /// Add resource units to the inventory.
    pub fn add_resource(&mut self, amount: u64) {
        let entry = self.inventory.entry(RESOURCE_KEY.to_owned()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Remove resource units from the inventory, clamping at zero.
    pub fn remove_resource(&mut self, amount: u64) {
        let entry = self.inventory.entry(RESOURCE_KEY.to_owned()).or_insert(0);
        *entry = entry.saturating_sub(amount);
    }

    /// Append a trade record, evicting the oldest beyond the cap.
    pub fn record_trade(&mut self, record: TradeRecord) {
        self.trade_history.push_back(record);
        while self.trade_history.len() > TRADE_HISTORY_CAP {
            self.trade_history.pop_front();
        }
    }

    /// Leaderboard score: hit points plus carried resource.
    pub fn score(&self) -> i64 {
        i64::from(self.hp).saturating_add(i64::try_from(self.resource()).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(tick: u64) -> TradeRecord {
        TradeRecord {
            tick,
            partner: AgentId::from("p"),
            amount: 1,
            value: 1.0,
            role: TradeRole::Giver,
        }
    }

    #[test]
    fn spawn_starts_with_full_vitals() {
        let agent = Agent::spawn(AgentId::from("a"), 3, 4);
        assert!(agent.alive);
        assert_eq!(agent.hp, MAX_HP);
        assert_eq!(agent.resource(), 0);
        assert!((agent.trust_score - NEUTRAL_TRUST).abs() < f64::EPSILON);
    }

    #[test]
    fn inventory_arithmetic_clamps_at_zero() {
        let mut agent = Agent::spawn(AgentId::from("a"), 0, 0);
        agent.add_resource(5);
        agent.remove_resource(9);
        assert_eq!(agent.resource(), 0);
    }

    #[test]
    fn trade_history_is_capped() {
        let mut agent = Agent::spawn(AgentId::from("a"), 0, 0);
        for tick in 0..60 {
            agent.record_trade(record(tick));
        }
        assert_eq!(agent.trade_history.len(), TRADE_HISTORY_CAP);
        assert_eq!(agent.trade_history.front().unwrap().tick, 10);
        assert_eq!(agent.trade_history.back().unwrap().tick, 59);
    }

    #[test]
    fn score_sums_hp_and_resource() {
        let mut agent = Agent::spawn(AgentId::from("a"), 0, 0);
        agent.add_resource(7);
        assert_eq!(agent.score(), 27);
    }

    #[test]
    fn optional_identity_fields_are_omitted_when_absent() {
        let agent = Agent::spawn(AgentId::from("a"), 0, 0);
        let value = serde_json::to_value(&agent).unwrap();
        assert!(value.get("name").is_none());
        assert!(value.get("wallet_address").is_none());
    }
}
