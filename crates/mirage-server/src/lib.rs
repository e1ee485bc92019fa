//! HTTP surface, session gate, and tick scheduler for the Mirage simulation.
//!
//! This crate wires the pure simulation core to the outside world: an
//! Axum router for agents and operators, the session gate that admits
//! paying agents, the timer-driven scheduler that drains pending actions
//! into the resolver, and the replay driver that rebuilds the world from
//! the event store on startup.
//!
//! # Concurrency discipline
//!
//! Two async mutexes, never held nested: the world lock (guarding the
//! [`Sim`](state::Sim) -- world state plus the pending action slots) and
//! the database lock. Every code path acquires the world lock, releases
//! it, and only then touches the database. This keeps database I/O out of
//! the simulation's critical section.
//!
//! # Modules
//!
//! - [`state`] -- shared application state and the two locks
//! - [`error`] -- the API error taxonomy
//! - [`gate`] -- session entry (quote + confirm)
//! - [`scheduler`] -- the tick loop and per-tick persistence
//! - [`replay`] -- snapshot + event replay recovery
//! - [`handlers`] -- request handlers
//! - [`router`] -- route table assembly

pub mod error;
pub mod gate;
pub mod handlers;
pub mod replay;
pub mod router;
pub mod scheduler;
pub mod state;
