//! Request handlers for the game API.
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `GET`  | `/health` | no | Liveness probe |
//! | `POST` | `/entry/quote` | no | Entry fee quote |
//! | `POST` | `/entry/confirm` | no | Confirm payment, mint credentials |
//! | `GET`  | `/world/observation` | yes | Caller's observation frame |
//! | `POST` | `/world/action` | yes | Queue an action for the next tick |
//! | `GET`  | `/world/status` | no | Tick, alive count, mean degradation |
//! | `GET`  | `/world/grid` | no | Full tile list + agent positions |
//! | `GET`  | `/world/agents` | no | All agent summaries |
//! | `GET`  | `/world/leaderboard` | no | Alive-first, score-descending top 20 |
//! | `GET`  | `/world/reputation` | no | Trust-score table |
//! | `GET`  | `/world/market` | no | Price and resource totals |
//! | `POST` | `/admin/tick` | no | Resolve one tick immediately |
//! | `POST` | `/admin/reset-world` | no | Full reset to tick 0 |
//! | `POST` | `/admin/spawn-demo-agents` | no | Spawn named demo agents |
//! | `GET`  | `/admin/events` | no | Recent event rows |
//! | `POST` | `/admin/dqn-log` | no | Persist training telemetry |
//! | `POST` | `/admin/finalize-game` | no | Persist the round's survivors |
//!
//! Authenticated routes read the `x-agent-token` header and resolve it
//! through the agents table.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use serde::Deserialize;

use mirage_types::{Action, AgentId, ApiKey, EventType, round1, round3};
use mirage_world::WorldState;

use crate::error::ApiError;
use crate::gate::{self, EntryConfirmRequest};
use crate::scheduler;
use crate::state::AppState;

/// Name of the bearer-style authentication header.
const AGENT_TOKEN_HEADER: &str = "x-agent-token";

/// Demo roster names used by the spawn endpoint.
const DEMO_AGENT_NAMES: [&str; 5] = [
    "Explorer_A",
    "Explorer_B",
    "Trader_A",
    "Fighter_A",
    "Survivor_A",
];

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for `POST /admin/spawn-demo-agents`.
#[derive(Debug, Deserialize)]
pub struct SpawnDemoQuery {
    /// How many demo agents to spawn (default 5, capped at 10).
    pub count: Option<usize>,
}

/// Query parameters for `GET /admin/events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Maximum number of events to return (default 50, clamped to 200).
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve the caller's token header into an agent id.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AgentId, ApiError> {
    let token = headers
        .get(AGENT_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::MissingToken)?;

    let db = state.db.lock().await;
    let row = db
        .agents()
        .get_by_token(token)
        .await?
        .ok_or(ApiError::InvalidToken)?;
    Ok(AgentId::from(row.agent_id))
}

/// Round to 4 decimal places (grid read-out wire format).
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness probe for deployment platforms.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

// ---------------------------------------------------------------------------
// POST /entry/quote + /entry/confirm
// ---------------------------------------------------------------------------

/// Quote the entry fee and payment instructions.
pub async fn entry_quote(State(state): State<AppState>) -> impl IntoResponse {
    Json(gate::quote(&state))
}

/// Confirm an entry payment and mint agent credentials.
pub async fn entry_confirm(
    State(state): State<AppState>,
    Json(request): Json<EntryConfirmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let grant = gate::confirm_entry(&state, &request).await?;
    Ok(Json(grant))
}

// ---------------------------------------------------------------------------
// GET /world/observation
// ---------------------------------------------------------------------------

/// Return the caller's observation frame.
pub async fn world_observation(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let agent_id = authenticate(&state, &headers).await?;
    let sim = state.sim.lock().await;
    let observation = sim
        .world
        .observe(&agent_id, state.settings.obs_radius)
        .ok_or(ApiError::AgentNotFound)?;
    Ok(Json(observation))
}

// ---------------------------------------------------------------------------
// POST /world/action
// ---------------------------------------------------------------------------

/// Queue the caller's action for the next tick (last write wins).
pub async fn world_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(action): Json<Action>,
) -> Result<impl IntoResponse, ApiError> {
    let agent_id = authenticate(&state, &headers).await?;

    let target_tick = {
        let mut sim = state.sim.lock().await;
        let agent = sim.world.agents.get(&agent_id).ok_or(ApiError::AgentNotFound)?;
        if !agent.alive {
            return Err(ApiError::AgentDead);
        }
        sim.pending.insert(agent_id.clone(), action.clone());
        sim.world.tick.saturating_add(1)
    };

    {
        let db = state.db.lock().await;
        db.events()
            .insert(
                target_tick,
                EventType::ActionSubmitted.as_str(),
                Some(&agent_id),
                &serde_json::to_value(&action)?,
            )
            .await?;
    }

    Ok(Json(serde_json::json!({
        "ok": true,
        "queued_for_tick": target_tick,
    })))
}

// ---------------------------------------------------------------------------
// World read-outs
// ---------------------------------------------------------------------------

/// Tick, alive count, and mean degradation.
pub async fn world_status(State(state): State<AppState>) -> impl IntoResponse {
    let sim = state.sim.lock().await;
    Json(serde_json::json!({
        "tick": sim.world.tick,
        "alive_agents": sim.world.alive_count(),
        "avg_degradation": sim.world.avg_degradation(),
    }))
}

/// Full tile list plus agent positions and scores.
pub async fn world_grid(State(state): State<AppState>) -> impl IntoResponse {
    let sim = state.sim.lock().await;
    let world = &sim.world;

    let mut tiles = Vec::new();
    for y in 0..world.size {
        for x in 0..world.size {
            let Some(tile) = world.tile_at(x, y) else {
                continue;
            };
            tiles.push(serde_json::json!({
                "x": x,
                "y": y,
                "degradation": round4(tile.degradation),
                "resource": tile.resource,
                "hazard": round4(tile.hazard),
            }));
        }
    }

    let agents: Vec<serde_json::Value> = world
        .roster
        .iter()
        .filter_map(|id| world.agents.get(id))
        .map(|agent| {
            serde_json::json!({
                "agent_id": agent.agent_id,
                "name": agent.name.clone().unwrap_or_default(),
                "x": agent.x,
                "y": agent.y,
                "hp": agent.hp,
                "alive": agent.alive,
                "resource": agent.resource(),
                "score": agent.score(),
                "trust_score": round1(agent.trust_score),
                "betrayals": agent.betrayals,
            })
        })
        .collect();

    Json(serde_json::json!({
        "tick": world.tick,
        "size": world.size,
        "tiles": tiles,
        "agents": agents,
    }))
}

/// All agent summaries.
pub async fn world_agents(State(state): State<AppState>) -> impl IntoResponse {
    let sim = state.sim.lock().await;
    let agents: Vec<serde_json::Value> = sim
        .world
        .roster
        .iter()
        .filter_map(|id| sim.world.agents.get(id))
        .map(|agent| {
            serde_json::json!({
                "agent_id": agent.agent_id,
                "x": agent.x,
                "y": agent.y,
                "hp": agent.hp,
                "alive": agent.alive,
                "inventory": agent.inventory,
            })
        })
        .collect();
    Json(serde_json::json!({
        "tick": sim.world.tick,
        "agents": agents,
    }))
}

/// Alive-first, score-descending top 20.
pub async fn world_leaderboard(State(state): State<AppState>) -> impl IntoResponse {
    let sim = state.sim.lock().await;
    let mut items: Vec<(bool, i64, serde_json::Value)> = sim
        .world
        .agents
        .values()
        .map(|agent| {
            let score = agent.score();
            (
                agent.alive,
                score,
                serde_json::json!({
                    "agent_id": agent.agent_id,
                    "name": agent.name.clone().unwrap_or_default(),
                    "alive": agent.alive,
                    "hp": agent.hp,
                    "resource": agent.resource(),
                    "score": score,
                }),
            )
        })
        .collect();
    items.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
    let items: Vec<serde_json::Value> =
        items.into_iter().take(20).map(|(_, _, item)| item).collect();
    Json(serde_json::json!({
        "tick": sim.world.tick,
        "items": items,
    }))
}

/// Trust-score table, descending.
pub async fn world_reputation(State(state): State<AppState>) -> impl IntoResponse {
    let sim = state.sim.lock().await;
    let mut items: Vec<serde_json::Value> = sim
        .world
        .agents
        .values()
        .map(|agent| {
            serde_json::json!({
                "agent_id": agent.agent_id,
                "name": agent.name.clone().unwrap_or_default(),
                "trust_score": round1(agent.trust_score),
                "betrayals": agent.betrayals,
                "trade_count": agent.trade_history.len(),
                "alive": agent.alive,
            })
        })
        .collect();
    items.sort_by(|a, b| {
        let score_a = a["trust_score"].as_f64().unwrap_or(0.0);
        let score_b = b["trust_score"].as_f64().unwrap_or(0.0);
        score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
    });
    Json(serde_json::json!({
        "tick": sim.world.tick,
        "items": items,
    }))
}

/// Market price and economic aggregates.
pub async fn world_market(State(state): State<AppState>) -> impl IntoResponse {
    let sim = state.sim.lock().await;
    let world = &sim.world;
    let total_agent_resources: u64 = world
        .agents
        .values()
        .filter(|agent| agent.alive)
        .map(mirage_types::Agent::resource)
        .sum();
    Json(serde_json::json!({
        "tick": world.tick,
        "market_price": round3(world.market_price),
        "total_world_resources": world.total_resources(),
        "total_agent_resources": total_agent_resources,
        "avg_degradation": round4(world.avg_degradation()),
        "recent_trades_count": world.recent_trades.len(),
    }))
}

// ---------------------------------------------------------------------------
// Admin operations
// ---------------------------------------------------------------------------

/// Resolve one tick immediately, bypassing the idle-world skip.
pub async fn admin_tick(State(state): State<AppState>) -> impl IntoResponse {
    let outcome = scheduler::resolve_tick(&state, true).await;
    Json(serde_json::json!({
        "ok": true,
        "tick": outcome.tick,
        "events": outcome.events,
    }))
}

/// Reset the world to tick 0 and truncate history.
///
/// The event log, snapshots, agents, and entries are all cleared so that
/// recovery after a reset starts from the reset, not from stale
/// pre-reset snapshots.
pub async fn admin_reset_world(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let (old_tick, world_json) = {
        let mut sim = state.sim.lock().await;
        let old_tick = sim.world.tick;
        sim.world = WorldState::new(state.settings.map_size);
        sim.pending.clear();
        (old_tick, serde_json::to_string(&sim.world)?)
    };

    {
        let db = state.db.lock().await;
        db.agents().clear().await?;
        db.entries().clear().await?;
        db.events().clear().await?;
        db.snapshots().clear().await?;
        db.events()
            .insert(
                0,
                EventType::WorldReset.as_str(),
                None,
                &serde_json::json!({"old_tick": old_tick, "reset_at": 0}),
            )
            .await?;
        db.snapshots().upsert(0, &world_json).await?;
    }

    tracing::info!(old_tick, "World reset by operator");
    Ok(Json(serde_json::json!({
        "ok": true,
        "old_tick": old_tick,
        "new_tick": 0,
    })))
}

/// Spawn up to 10 named demo agents.
pub async fn admin_spawn_demo_agents(
    State(state): State<AppState>,
    Query(query): Query<SpawnDemoQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let count = query.count.unwrap_or(5).min(10);
    let mut spawned = Vec::new();

    for index in 0..count {
        let agent_id = AgentId::from(format!(
            "demo_{}",
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        ));
        let api_key = ApiKey::new();
        let name = DEMO_AGENT_NAMES
            .get(index)
            .map_or_else(|| format!("Agent_{}", index.saturating_add(1)), ToString::to_string);

        let (agent_json, tick) = {
            let mut sim = state.sim.lock().await;
            sim.world.add_agent(agent_id.clone());
            if let Some(agent) = sim.world.agents.get_mut(&agent_id) {
                agent.name = Some(name.clone());
            }
            let agent_json = sim
                .world
                .agents
                .get(&agent_id)
                .map(serde_json::to_string)
                .transpose()?
                .unwrap_or_default();
            (agent_json, sim.world.tick)
        };

        {
            let db = state.db.lock().await;
            db.agents().upsert(&agent_id, &api_key, &agent_json).await?;
            db.entries()
                .insert(&format!("demo_{agent_id}"), &agent_id, "DEMO", "0")
                .await?;
            db.events()
                .insert(
                    tick,
                    EventType::AgentEntered.as_str(),
                    Some(&agent_id),
                    &serde_json::json!({
                        "agent_id": agent_id,
                        "name": name,
                        "demo": true,
                    }),
                )
                .await?;
        }

        spawned.push(serde_json::json!({"agent_id": agent_id, "name": name}));
    }

    // One snapshot after the batch so recovery sees the new roster.
    let world_json = {
        let sim = state.sim.lock().await;
        serde_json::to_string(&sim.world)?
    };
    {
        let sim_tick = { state.sim.lock().await.world.tick };
        let db = state.db.lock().await;
        db.snapshots().upsert(sim_tick, &world_json).await?;
    }

    Ok(Json(serde_json::json!({
        "ok": true,
        "spawned": spawned.len(),
        "agents": spawned,
    })))
}

/// Recent events, newest first.
pub async fn admin_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let rows = {
        let db = state.db.lock().await;
        db.events().list_recent(limit).await?
    };
    let items: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| {
            serde_json::json!({
                "id": row.id,
                "tick": row.tick,
                "type": row.event_type,
                "agent_id": row.agent_id,
                "payload": row.payload().unwrap_or(serde_json::Value::Null),
                "created_at": row.created_at.to_rfc3339(),
            })
        })
        .collect();
    Ok(Json(serde_json::json!({"items": items})))
}

/// Persist a bounded `DQN_LOG` training-telemetry event.
pub async fn admin_dqn_log(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = serde_json::json!({
        "mistakes": tail_of(&body, "mistakes", 20),
        "episode_rewards": tail_of(&body, "episode_rewards", 50),
        "step_count": body.get("step_count").cloned().unwrap_or(serde_json::json!(0)),
        "epsilon": body.get("epsilon").cloned().unwrap_or(serde_json::json!(1.0)),
        "loss_history": tail_of(&body, "loss_history", 50),
        "total_reward": body.get("total_reward").cloned().unwrap_or(serde_json::json!(0)),
    });

    let tick = { state.sim.lock().await.world.tick };
    {
        let db = state.db.lock().await;
        db.events()
            .insert(tick, EventType::DqnLog.as_str(), None, &payload)
            .await?;
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

/// Persist a `GAME_FINALIZED` event with the round's survivors.
///
/// Without an explicit survivor list, the alive roster is used with a
/// zero placeholder address.
pub async fn admin_finalize_game(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let explicit = body
        .get("survivors")
        .and_then(serde_json::Value::as_array)
        .filter(|list| !list.is_empty())
        .cloned();

    let (tick, survivors) = {
        let sim = state.sim.lock().await;
        let tick = sim.world.tick;
        let survivors = explicit.unwrap_or_else(|| {
            sim.world
                .agents
                .values()
                .filter(|agent| agent.alive)
                .map(|agent| {
                    serde_json::json!({
                        "address": "0x0000000000000000000000000000000000000000",
                        "agent_id": agent.agent_id,
                        "ticks": tick,
                    })
                })
                .collect()
        });
        (tick, survivors)
    };

    let survivor_count = survivors.len();
    {
        let db = state.db.lock().await;
        db.events()
            .insert(
                tick,
                EventType::GameFinalized.as_str(),
                None,
                &serde_json::json!({"survivors": survivors, "end_tick": tick}),
            )
            .await?;
    }
    Ok(Json(serde_json::json!({
        "ok": true,
        "tick": tick,
        "survivors": survivor_count,
    })))
}

/// Last `cap` elements of an array field, or an empty array.
fn tail_of(body: &serde_json::Value, field: &str, cap: usize) -> serde_json::Value {
    body.get(field)
        .and_then(serde_json::Value::as_array)
        .map_or_else(
            || serde_json::json!([]),
            |list| {
                let start = list.len().saturating_sub(cap);
                serde_json::Value::Array(list.get(start..).unwrap_or_default().to_vec())
            },
        )
}
