//! Recovery tests: snapshot + event replay determinism and the
//! extinction-triggered world reset.
//!
//! These run against an in-memory `SQLite` database through the same gate,
//! scheduler, and replay code paths the server uses.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use mirage_chain::{NullAnchorSink, StaticEntryVerifier};
use mirage_core::Settings;
use mirage_db::Database;
use mirage_server::gate::{self, EntryConfirmRequest, EntryGrant};
use mirage_server::replay;
use mirage_server::scheduler;
use mirage_server::state::AppState;
use mirage_types::{Action, AgentId, EventType};
use mirage_world::WorldState;

async fn test_state() -> AppState {
    let db = Database::connect(":memory:").await.unwrap();
    db.init().await.unwrap();
    let world = replay::load_world(&db, 20).await.unwrap();
    AppState::new(
        world,
        db,
        Settings::default(),
        Arc::new(StaticEntryVerifier { paid: true }),
        Arc::new(NullAnchorSink),
    )
}

async fn enter(state: &AppState, name: &str) -> EntryGrant {
    gate::confirm_entry(
        state,
        &EntryConfirmRequest {
            tx_ref: String::from("demo_test"),
            name: Some(name.to_owned()),
            agent_address: None,
        },
    )
    .await
    .unwrap()
}

/// Mirror the submit path: slot write plus `ACTION_SUBMITTED` event
/// targeted at the next tick.
async fn submit(state: &AppState, agent_id: &AgentId, action: Action) {
    let target_tick = {
        let mut sim = state.sim.lock().await;
        sim.pending.insert(agent_id.clone(), action.clone());
        sim.world.tick + 1
    };
    let db = state.db.lock().await;
    db.events()
        .insert(
            target_tick,
            EventType::ActionSubmitted.as_str(),
            Some(agent_id),
            &serde_json::to_value(&action).unwrap(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn fresh_store_seeds_a_tick_zero_world() {
    let db = Database::connect(":memory:").await.unwrap();
    db.init().await.unwrap();
    let world = replay::load_world(&db, 20).await.unwrap();
    assert_eq!(world.tick, 0);
    assert!(world.agents.is_empty());
    assert!(db.snapshots().get(0).await.unwrap().is_some());
}

#[tokio::test]
async fn replayed_world_is_byte_identical_to_the_live_one() {
    let state = test_state().await;
    let a = enter(&state, "alpha").await;
    let b = enter(&state, "beta").await;

    for _ in 0..25 {
        submit(&state, &a.agent_id, Action::Rest).await;
        submit(&state, &b.agent_id, Action::Rest).await;
        let outcome = scheduler::resolve_tick(&state, false).await;
        assert!(!outcome.skipped);
    }

    let live_json = {
        let sim = state.sim.lock().await;
        assert_eq!(sim.world.tick, 25);
        serde_json::to_string(&sim.world).unwrap()
    };

    let db = state.db.lock().await;
    let rebuilt = replay::load_world(&db, 20).await.unwrap();
    let rebuilt_json = serde_json::to_string(&rebuilt).unwrap();
    assert_eq!(rebuilt_json, live_json);
}

#[tokio::test]
async fn replay_reapplies_mutating_actions() {
    let state = test_state().await;
    let a = enter(&state, "digger").await;

    // A mix of gathers and rests across 12 ticks, crossing the tick-10
    // snapshot so replay has both a snapshot prefix and an event suffix.
    for round in 0..12u64 {
        let action = if round % 2 == 0 { Action::Gather } else { Action::Rest };
        submit(&state, &a.agent_id, action).await;
        scheduler::resolve_tick(&state, false).await;
    }

    let live_json = {
        let sim = state.sim.lock().await;
        serde_json::to_string(&sim.world).unwrap()
    };

    let db = state.db.lock().await;
    let rebuilt = replay::load_world(&db, 20).await.unwrap();
    assert_eq!(serde_json::to_string(&rebuilt).unwrap(), live_json);
    assert!(rebuilt.agents.get(&a.agent_id).unwrap().resource() > 0);
}

#[tokio::test]
async fn snapshots_follow_the_configured_cadence() {
    let state = test_state().await;
    let a = enter(&state, "walker").await;

    for _ in 0..25 {
        submit(&state, &a.agent_id, Action::Rest).await;
        scheduler::resolve_tick(&state, false).await;
    }

    let db = state.db.lock().await;
    for tick in [0, 10, 20] {
        assert!(
            db.snapshots().get(tick).await.unwrap().is_some(),
            "expected a snapshot at tick {tick}"
        );
    }
    assert!(db.snapshots().get(15).await.unwrap().is_none());
    assert_eq!(db.snapshots().latest().await.unwrap().unwrap().tick, 20);
}

#[tokio::test]
async fn idle_worlds_skip_ticks_entirely() {
    let state = test_state().await;
    let outcome = scheduler::resolve_tick(&state, false).await;
    assert!(outcome.skipped);
    let sim = state.sim.lock().await;
    assert_eq!(sim.world.tick, 0);
}

#[tokio::test]
async fn extinction_entry_regenerates_the_world() {
    let state = test_state().await;
    let first = enter(&state, "pioneer").await;

    // Kill the only agent and dirty the grid plus the pending slots.
    {
        let mut sim = state.sim.lock().await;
        if let Some(agent) = sim.world.agents.get_mut(&first.agent_id) {
            agent.alive = false;
            agent.hp = 0;
        }
        sim.pending.insert(first.agent_id.clone(), Action::Rest);
        if let Some(tile) = sim.world.tile_at_mut(0, 0) {
            tile.resource = 0;
            tile.degradation = 0.9;
        }
    }

    let second = enter(&state, "successor").await;

    {
        let sim = state.sim.lock().await;
        assert_eq!(sim.world.grid, WorldState::new(20).grid);
        assert!(!sim.world.agents.contains_key(&first.agent_id));
        assert!(sim.world.agents.contains_key(&second.agent_id));
        assert!(sim.pending.is_empty());
    }

    let db = state.db.lock().await;
    // Both entries found an extinct world: the first joined an empty one.
    assert_eq!(
        db.events().count_of_type("WORLD_RESET_IF_EXTINCT").await.unwrap(),
        2
    );

    // The entry-time snapshot makes the reset crash-consistent: recovery
    // must reproduce the regenerated world, not the pre-reset one.
    let rebuilt = replay::load_world(&db, 20).await.unwrap();
    assert_eq!(rebuilt.grid, WorldState::new(20).grid);
    assert!(rebuilt.agents.contains_key(&second.agent_id));
}

#[tokio::test]
async fn overlay_restores_agents_from_their_rows() {
    let state = test_state().await;
    let a = enter(&state, "veteran").await;
    submit(&state, &a.agent_id, Action::Gather).await;
    scheduler::resolve_tick(&state, false).await;

    let db = state.db.lock().await;
    let rows = db.agents().list().await.unwrap();
    assert_eq!(rows.len(), 1);

    // Overlay onto a world that has never seen the agent.
    let mut world = WorldState::new(20);
    replay::overlay_agents(&mut world, &rows);
    let agent = world.agents.get(&a.agent_id).unwrap();
    assert_eq!(agent.resource(), 1);
    assert_eq!(world.roster.len(), 1);
}
