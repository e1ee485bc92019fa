//! The authoritative world state: grid, agent registry, market, and the
//! read-only observation extractor.
//!
//! [`WorldState`] is mutated only by the tick resolver and the session
//! gate, always under the world lock. It serializes directly to the
//! snapshot format, so every field ordering here is deterministic:
//! agents live in a `BTreeMap`, and `roster` preserves registration order
//! for the resolver's insertion-order-stable iteration.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use mirage_types::{
    Agent, AgentGlimpse, AgentId, EventType, Observation, RecentTrade, ReputationChangedDetails,
    ReputationReason, Tile, TileView, WorldEvent, round1, round2, round3,
};

use crate::physics::{MAX_TILE_RESOURCE, make_tile};
use crate::seed::stable_unit;

/// Cap on the recent-trade window used for betrayal detection.
pub const RECENT_TRADES_CAP: usize = 20;

/// Ticks a trade stays "recent" for betrayal detection.
pub const BETRAYAL_WINDOW_TICKS: u64 = 10;

/// Spawn ring inner radius (squared distance lower bound is this squared).
const SPAWN_INNER_RADIUS: i32 = 2;

/// Spawn ring outer radius; candidate offsets are drawn from `[-R, R)`.
const SPAWN_OUTER_RADIUS: i32 = 3;

/// Number of candidate spawn offsets tried before settling.
const SPAWN_ATTEMPTS: u32 = 8;

/// Hard price ceiling for the resource market.
const MARKET_PRICE_CAP: f64 = 5.0;

/// The complete simulation world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    /// Side length of the square grid.
    pub size: i32,
    /// Monotone tick counter; the resolver is the only writer.
    pub tick: u64,
    /// Row-major grid of tiles (`grid[y][x]`).
    pub grid: Vec<Vec<Tile>>,
    /// Agent registry keyed by identifier.
    pub agents: BTreeMap<AgentId, Agent>,
    /// Agent identifiers in registration order; drives resolver iteration.
    #[serde(default)]
    pub roster: Vec<AgentId>,
    /// Current price per resource unit, in `[1.0, 5.0]`.
    pub market_price: f64,
    /// Bounded FIFO of recent trades for betrayal detection.
    #[serde(default)]
    pub recent_trades: VecDeque<RecentTrade>,
    /// The last tick a state hash was anchored.
    pub last_anchor_tick: u64,
    /// The most recently anchored state hash (hex), empty before the first.
    pub state_hash: String,
}

impl WorldState {
    /// Create a fresh world at tick 0 with a deterministically seeded grid.
    pub fn new(size: i32) -> Self {
        Self {
            size,
            tick: 0,
            grid: build_grid(size),
            agents: BTreeMap::new(),
            roster: Vec::new(),
            market_price: 1.0,
            recent_trades: VecDeque::new(),
            last_anchor_tick: 0,
            state_hash: String::new(),
        }
    }

    // -------------------------------------------------------------------
    // Grid access
    // -------------------------------------------------------------------

    /// Whether `(x, y)` lies inside the grid.
    pub const fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.size && y >= 0 && y < self.size
    }

    /// The tile at `(x, y)`, or `None` when out of bounds.
    pub fn tile_at(&self, x: i32, y: i32) -> Option<&Tile> {
        self.grid
            .get(usize::try_from(y).ok()?)?
            .get(usize::try_from(x).ok()?)
    }

    /// Mutable access to the tile at `(x, y)`, or `None` when out of bounds.
    pub fn tile_at_mut(&mut self, x: i32, y: i32) -> Option<&mut Tile> {
        self.grid
            .get_mut(usize::try_from(y).ok()?)?
            .get_mut(usize::try_from(x).ok()?)
    }

    // -------------------------------------------------------------------
    // Aggregates
    // -------------------------------------------------------------------

    /// Number of alive agents.
    pub fn alive_count(&self) -> usize {
        self.agents.values().filter(|a| a.alive).count()
    }

    /// Sum of resource across all tiles.
    pub fn total_resources(&self) -> u64 {
        self.grid
            .iter()
            .flatten()
            .map(|t| u64::from(t.resource))
            .sum()
    }

    /// Sum of degradation across all tiles.
    pub fn total_degradation(&self) -> f64 {
        self.grid.iter().flatten().map(|t| t.degradation).sum()
    }

    /// Mean degradation across all tiles.
    pub fn avg_degradation(&self) -> f64 {
        // The grid dimension is far below f64's exact-integer range.
        #[allow(clippy::cast_precision_loss)]
        let cells = (self.size as f64) * (self.size as f64);
        if cells > 0.0 {
            self.total_degradation() / cells
        } else {
            0.0
        }
    }

    // -------------------------------------------------------------------
    // Economy
    // -------------------------------------------------------------------

    /// Recompute the market price from scarcity and degradation.
    ///
    /// `price = (1 + 2.5 * scarcity) * (1 + 1.5 * avg_degradation)`, capped
    /// at 5.0. Both factors are monotone, so the price rises as the world
    /// empties and wears out.
    pub fn calculate_market_price(&self) -> f64 {
        // Grid dimensions and resource totals sit far below 2^53.
        #[allow(clippy::cast_precision_loss)]
        let max_resources = (self.size as f64) * (self.size as f64) * f64::from(MAX_TILE_RESOURCE);
        #[allow(clippy::cast_precision_loss)]
        let scarcity = 1.0 - (self.total_resources() as f64) / max_resources;
        let scarcity_multiplier = 1.0 + scarcity * 2.5;
        let degradation_multiplier = 1.0 + self.avg_degradation() * 1.5;
        (scarcity_multiplier * degradation_multiplier).min(MARKET_PRICE_CAP)
    }

    // -------------------------------------------------------------------
    // Registry
    // -------------------------------------------------------------------

    /// Register a new agent, spawning it near the grid centre.
    ///
    /// Spawn placement samples up to 8 deterministic candidate offsets from
    /// the agent id; the first candidate whose squared distance from centre
    /// falls inside the `[2, 3]` ring wins, otherwise the last candidate
    /// stands. Candidates are always snapped into bounds first.
    ///
    /// Returns a clone of the registered agent.
    pub fn add_agent(&mut self, agent_id: AgentId) -> Agent {
        // Grid size is small and positive; centre math cannot overflow.
        #[allow(clippy::arithmetic_side_effects)]
        let (center_x, center_y) = (self.size / 2 - 1, self.size / 2 - 1);

        let (mut x, mut y) = self.spawn_candidate(&agent_id, 0);
        for attempt in 1..SPAWN_ATTEMPTS {
            // Candidates are snapped into bounds, so the squared ring
            // distance stays tiny.
            #[allow(clippy::arithmetic_side_effects)]
            let in_ring = {
                let dx = x - center_x;
                let dy = y - center_y;
                let dist2 = dx * dx + dy * dy;
                (SPAWN_INNER_RADIUS * SPAWN_INNER_RADIUS
                    ..=SPAWN_OUTER_RADIUS * SPAWN_OUTER_RADIUS)
                    .contains(&dist2)
            };
            if in_ring {
                break;
            }
            (x, y) = self.spawn_candidate(&agent_id, attempt);
        }

        let agent = Agent::spawn(agent_id.clone(), x, y);
        if !self.agents.contains_key(&agent_id) {
            self.roster.push(agent_id.clone());
        }
        self.agents.insert(agent_id, agent.clone());
        agent
    }

    /// One deterministic spawn candidate for `agent_id`, snapped into bounds.
    fn spawn_candidate(&self, agent_id: &AgentId, attempt: u32) -> (i32, i32) {
        // Grid size is small and positive; centre math cannot overflow.
        #[allow(clippy::arithmetic_side_effects)]
        let (center_x, center_y) = (self.size / 2 - 1, self.size / 2 - 1);
        let sx = stable_unit(&format!("spawnx:{agent_id}:{attempt}"));
        let sy = stable_unit(&format!("spawny:{agent_id}:{attempt}"));
        // Truncation toward zero is the intended projection onto the ring.
        #[allow(clippy::cast_possible_truncation)]
        let dx = ((sx - 0.5) * 2.0 * f64::from(SPAWN_OUTER_RADIUS)) as i32;
        #[allow(clippy::cast_possible_truncation)]
        let dy = ((sy - 0.5) * 2.0 * f64::from(SPAWN_OUTER_RADIUS)) as i32;
        // Offsets are at most the outer radius; snapping keeps both axes
        // inside the grid.
        #[allow(clippy::arithmetic_side_effects)]
        let x = (center_x + dx).clamp(0, self.size - 1);
        #[allow(clippy::arithmetic_side_effects)]
        let y = (center_y + dy).clamp(0, self.size - 1);
        (x, y)
    }

    /// Regenerate the grid from its deterministic seeds.
    pub fn reset_environment(&mut self) {
        self.grid = build_grid(self.size);
    }

    /// Regenerate the grid and clear the agent registry.
    ///
    /// Used by the session gate when the extinction condition is observed
    /// at entry time. The tick counter is preserved.
    pub fn reset_session(&mut self) {
        self.reset_environment();
        self.agents.clear();
        self.roster.clear();
        debug!(tick = self.tick, "World session reset: grid regenerated, registry cleared");
    }

    // -------------------------------------------------------------------
    // Reputation
    // -------------------------------------------------------------------

    /// Apply a trust-score change, clamped to `[0, 100]`.
    ///
    /// Returns the `REPUTATION_CHANGED` event, or `None` if the agent does
    /// not exist.
    pub fn update_reputation(
        &mut self,
        agent_id: &AgentId,
        change: f64,
        reason: ReputationReason,
    ) -> Option<WorldEvent> {
        let tick = self.tick;
        let agent = self.agents.get_mut(agent_id)?;
        let old_score = agent.trust_score;
        agent.trust_score = (agent.trust_score + change).clamp(0.0, 100.0);
        Some(WorldEvent::new(
            tick,
            EventType::ReputationChanged,
            Some(agent_id.clone()),
            &ReputationChangedDetails {
                old_score: round1(old_score),
                new_score: round1(agent.trust_score),
                change: round1(change),
                reason,
            },
        ))
    }

    /// Whether `attacker` and `victim` traded (in either direction) within
    /// the betrayal window.
    pub fn detect_betrayal(&self, attacker: &AgentId, victim: &AgentId) -> bool {
        self.recent_trades.iter().any(|trade| {
            self.tick.saturating_sub(trade.tick) <= BETRAYAL_WINDOW_TICKS
                && ((trade.agent_id == *attacker && trade.target_id == *victim)
                    || (trade.agent_id == *victim && trade.target_id == *attacker))
        })
    }

    /// Append to the recent-trade window, evicting the oldest beyond the cap.
    pub fn record_recent_trade(&mut self, trade: RecentTrade) {
        self.recent_trades.push_back(trade);
        while self.recent_trades.len() > RECENT_TRADES_CAP {
            self.recent_trades.pop_front();
        }
    }

    // -------------------------------------------------------------------
    // Anchoring
    // -------------------------------------------------------------------

    /// Compute the canonical SHA-256 hash of the anchorable state projection.
    ///
    /// The projection is a compact JSON object with lexicographically sorted
    /// keys: the tick, each agent's `(x, y, hp, resources, alive, trust)` with
    /// trust rounded to 2 decimals, and the grid's degradation and resource
    /// totals. Canonical key ordering comes from `serde_json`'s default
    /// `BTreeMap`-backed object representation.
    pub fn compute_state_hash(&self) -> String {
        let mut agents = serde_json::Map::new();
        for (agent_id, agent) in &self.agents {
            agents.insert(
                agent_id.as_str().to_owned(),
                serde_json::json!({
                    "x": agent.x,
                    "y": agent.y,
                    "hp": agent.hp,
                    "resources": agent.resource(),
                    "alive": agent.alive,
                    "trust": round2(agent.trust_score),
                }),
            );
        }
        let projection = serde_json::json!({
            "tick": self.tick,
            "agents": agents,
            "total_degradation": self.total_degradation(),
            "total_resources": self.total_resources(),
        });
        let canonical = projection.to_string();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }

    // -------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------

    /// Extract the observation for `agent_id` with the given tile radius.
    ///
    /// Returns `None` for unknown agents. Dead callers receive the frame
    /// with empty tile and agent lists.
    pub fn observe(&self, agent_id: &AgentId, radius: i32) -> Option<Observation> {
        let agent = self.agents.get(agent_id)?;

        let mut tiles = Vec::new();
        let mut nearby_agents = Vec::new();
        let mut all_agents = Vec::new();

        if agent.alive {
            // Window coordinates stay within one radius of an in-bounds agent.
            #[allow(clippy::arithmetic_side_effects)]
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let x = agent.x + dx;
                    let y = agent.y + dy;
                    let Some(tile) = self.tile_at(x, y) else {
                        continue;
                    };
                    tiles.push(TileView {
                        x,
                        y,
                        degradation: tile.degradation,
                        resource: tile.resource,
                        hazard: tile.hazard,
                    });
                }
            }

            for other_id in &self.roster {
                let Some(other) = self.agents.get(other_id) else {
                    continue;
                };
                if other_id == agent_id || !other.alive {
                    continue;
                }
                let glimpse = AgentGlimpse {
                    agent_id: other_id.clone(),
                    x: other.x,
                    y: other.y,
                    hp: other.hp,
                    trust_score: round1(other.trust_score),
                };
                // Chebyshev distance on small in-bounds grid coordinates.
                #[allow(clippy::arithmetic_side_effects)]
                let within_radius =
                    (other.x - agent.x).abs() <= radius && (other.y - agent.y).abs() <= radius;
                if within_radius {
                    nearby_agents.push(glimpse.clone());
                }
                all_agents.push(glimpse);
            }
        }

        Some(Observation {
            tick: self.tick,
            radius,
            agent: agent.clone(),
            tiles,
            nearby_agents,
            all_agents,
            alive_agents: self.alive_count(),
            market_price: round3(self.market_price),
        })
    }
}

/// Build the deterministic genesis grid for a given size.
fn build_grid(size: i32) -> Vec<Vec<Tile>> {
    (0..size)
        .map(|y| (0..size).map(|x| make_tile(x, y)).collect())
        .collect()
}
