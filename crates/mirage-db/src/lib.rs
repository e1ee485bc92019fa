//! `SQLite` data layer for the Mirage simulation.
//!
//! A single database file holds four tables: the append-only event log
//! (the source of truth), per-tick world snapshots (replay starting
//! points), agent credentials and their latest serialized state, and
//! payment entry records. All access is serialized behind the server's
//! `db_lock`, so the pool holds a single connection; that also makes
//! `:memory:` databases usable in tests.
//!
//! Uses [`sqlx`] with runtime query construction (not compile-time
//! checked) to avoid requiring a live database at build time. All queries
//! are parameterized.
//!
//! # Modules
//!
//! - [`sqlite`] -- connection pool and schema bootstrap
//! - [`event_store`] -- append and query simulation events
//! - [`snapshot_store`] -- upsert and fetch world snapshots
//! - [`agent_store`] -- agent credentials and persisted state
//! - [`entry_store`] -- payment entry records
//! - [`error`] -- shared error type

pub mod agent_store;
pub mod entry_store;
pub mod error;
pub mod event_store;
pub mod snapshot_store;
pub mod sqlite;

pub use agent_store::{AgentRow, AgentStore};
pub use entry_store::EntryStore;
pub use error::DbError;
pub use event_store::{EventRow, EventStore};
pub use snapshot_store::{SnapshotRow, SnapshotStore};
pub use sqlite::Database;
