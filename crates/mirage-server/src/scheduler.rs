//! The tick scheduler and per-tick persistence.
//!
//! A single cooperative timer drives the simulation. Each firing drains
//! the pending action slots and runs the resolver under the world lock,
//! then persists the tick under the database lock: one `TICK_RESOLVED`
//! row bundling the drained actions and emitted events, one row per
//! event, refreshed agent rows, and a snapshot on the configured cadence.
//!
//! An idle world (zero alive agents, nothing pending) skips the tick
//! entirely -- neither the counter nor the event log advances. Transient
//! database failures are retried once and then logged; they never kill
//! the loop. `STATE_ANCHORED` events are handed to the anchor sink on
//! detached tasks, fire-and-forget.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use mirage_db::DbError;
use mirage_types::{Action, AgentId, ApiKey, EventType, StateAnchoredDetails, WorldEvent};

use crate::state::AppState;

/// Summary of one scheduler firing.
#[derive(Debug, Clone, Copy)]
pub struct TickOutcome {
    /// The world tick after this firing.
    pub tick: u64,
    /// Number of events the resolver emitted (0 when skipped).
    pub events: usize,
    /// Whether the firing skipped an idle world.
    pub skipped: bool,
}

/// Resolve one tick: drain pending actions, step the world, persist.
///
/// With `force` false (the scheduler), an idle world is skipped. With
/// `force` true (the admin trigger), the tick always resolves.
pub async fn resolve_tick(state: &AppState, force: bool) -> TickOutcome {
    // Phase 1: drain and resolve under the world lock. No database I/O
    // happens while this lock is held.
    let (tick, actions, events, agent_states, snapshot) = {
        let mut sim = state.sim.lock().await;
        if !force && sim.world.alive_count() == 0 && sim.pending.is_empty() {
            return TickOutcome {
                tick: sim.world.tick,
                events: 0,
                skipped: true,
            };
        }
        let actions = std::mem::take(&mut sim.pending);
        let events = mirage_core::step(&mut sim.world, &actions);
        let tick = sim.world.tick;
        let agent_states: Vec<(AgentId, String)> = sim
            .world
            .agents
            .iter()
            .map(|(id, agent)| {
                (
                    id.clone(),
                    serde_json::to_string(agent).unwrap_or_default(),
                )
            })
            .collect();
        let every = state.settings.snapshot_every_ticks;
        let snapshot = (every > 0 && tick % every == 0)
            .then(|| serde_json::to_string(&sim.world).unwrap_or_default());
        (tick, actions, events, agent_states, snapshot)
    };

    // Phase 2: persist under the database lock, with one retry. The
    // scheduler survives persistent failure; it logs and keeps ticking.
    if let Err(first) = persist_tick(state, tick, &actions, &events, &agent_states, snapshot.as_deref()).await
    {
        warn!(tick, error = %first, "Tick persistence failed; retrying once");
        if let Err(second) =
            persist_tick(state, tick, &actions, &events, &agent_states, snapshot.as_deref()).await
        {
            let correlation_id = uuid::Uuid::new_v4();
            error!(%correlation_id, tick, error = %second, "Tick persistence failed after retry; continuing");
        }
    }

    // Phase 3: hand anchored hashes to the sink, fire-and-forget.
    dispatch_anchors(state, tick, &events);

    TickOutcome {
        tick,
        events: events.len(),
        skipped: false,
    }
}

/// Write one resolved tick to the event store.
async fn persist_tick(
    state: &AppState,
    tick: u64,
    actions: &BTreeMap<AgentId, Action>,
    events: &[WorldEvent],
    agent_states: &[(AgentId, String)],
    snapshot: Option<&str>,
) -> Result<(), DbError> {
    let db = state.db.lock().await;

    let resolved = serde_json::json!({
        "actions": actions,
        "events": events,
    });
    db.events()
        .insert(tick, EventType::TickResolved.as_str(), None, &resolved)
        .await?;

    for event in events {
        db.events()
            .insert(
                tick,
                event.event_type.as_str(),
                event.agent_id.as_ref(),
                &serde_json::to_value(event)?,
            )
            .await?;
    }

    // Refresh persisted agent state for every agent with credentials.
    for (agent_id, state_json) in agent_states {
        let Some(api_key) = db.agents().api_key_of(agent_id).await? else {
            continue;
        };
        db.agents()
            .upsert(agent_id, &ApiKey::from(api_key), state_json)
            .await?;
    }

    if let Some(world_json) = snapshot {
        db.snapshots().upsert(tick, world_json).await?;
    }

    Ok(())
}

/// Spawn one detached anchor submission per `STATE_ANCHORED` event.
fn dispatch_anchors(state: &AppState, tick: u64, events: &[WorldEvent]) {
    for event in events {
        if event.event_type != EventType::StateAnchored {
            continue;
        }
        let Ok(details) = serde_json::from_value::<StateAnchoredDetails>(event.details.clone())
        else {
            continue;
        };
        let sink = Arc::clone(&state.anchor);
        tokio::spawn(async move {
            if !sink
                .anchor_state(tick, &details.state_hash, details.alive_agents)
                .await
            {
                debug!(tick, "Anchor submission reported failure");
            }
        });
    }
}

/// Run the scheduler until `shutdown` flips.
///
/// The shutdown check sits between ticks: a tick that has started always
/// drains fully (resolution and persistence) before the loop exits, so a
/// partially-applied tick is impossible.
pub async fn run_scheduler(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_millis(state.settings.tick_interval_ms.max(1));
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_ms = state.settings.tick_interval_ms, "Tick scheduler started");
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let outcome = resolve_tick(&state, false).await;
                if !outcome.skipped {
                    debug!(tick = outcome.tick, events = outcome.events, "Tick resolved");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    info!("Tick scheduler stopped");
}
