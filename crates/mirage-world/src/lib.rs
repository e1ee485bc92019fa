//! Grid, tile physics, and world state for the Mirage simulation.
//!
//! The world is a fixed-size square grid of tiles plus an agent registry.
//! Everything pseudo-random in this crate -- tile genesis, spawn offsets --
//! is derived from a pure hash of its inputs, never from a stateful RNG, so
//! that rebuilding the world from a snapshot and an event log reproduces
//! bit-identical state.
//!
//! # Modules
//!
//! - [`seed`] -- hash-of-inputs projection to `[0, 1)`
//! - [`physics`] -- per-tile per-tick update rules and hazard damage
//! - [`world`] -- [`WorldState`]: grid, registry, market, observation

pub mod physics;
pub mod seed;
pub mod world;

pub use physics::{apply_tile_tick, hazard_damage, make_tile};
pub use seed::stable_unit;
pub use world::{RECENT_TRADES_CAP, WorldState};
