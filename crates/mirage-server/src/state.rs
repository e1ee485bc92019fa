//! Shared application state and the two-lock concurrency model.
//!
//! [`AppState`] is cloned into every handler. It carries the world lock
//! (world state + pending action slots), the database lock, the settings,
//! and the chain-facing collaborators.
//!
//! Lock ordering is strict: world lock first, released before the
//! database lock is taken. Holding both at once is forbidden -- the
//! resolver must never wait on database I/O.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use mirage_chain::{AnchorSink, EntryVerifier};
use mirage_core::Settings;
use mirage_db::Database;
use mirage_types::{Action, AgentId};
use mirage_world::WorldState;

/// Everything guarded by the world lock.
#[derive(Debug)]
pub struct Sim {
    /// The authoritative world state.
    pub world: WorldState,
    /// Pending action slots: at most one queued action per agent,
    /// last write wins, drained atomically at each tick boundary.
    pub pending: BTreeMap<AgentId, Action>,
}

/// Shared state for the Axum application.
#[derive(Clone)]
pub struct AppState {
    /// The world lock: guards the world and the pending action slots.
    pub sim: Arc<Mutex<Sim>>,
    /// The database lock: serializes every event store access.
    pub db: Arc<Mutex<Database>>,
    /// Runtime settings.
    pub settings: Arc<Settings>,
    /// Entry payment verifier (chain mode only).
    pub verifier: Arc<dyn EntryVerifier>,
    /// Fire-and-forget consumer for anchored state hashes.
    pub anchor: Arc<dyn AnchorSink>,
}

impl AppState {
    /// Assemble the application state around a recovered world.
    pub fn new(
        world: WorldState,
        db: Database,
        settings: Settings,
        verifier: Arc<dyn EntryVerifier>,
        anchor: Arc<dyn AnchorSink>,
    ) -> Self {
        Self {
            sim: Arc::new(Mutex::new(Sim {
                world,
                pending: BTreeMap::new(),
            })),
            db: Arc::new(Mutex::new(db)),
            settings: Arc::new(settings),
            verifier,
            anchor,
        }
    }
}
