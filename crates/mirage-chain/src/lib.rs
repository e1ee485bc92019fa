//! External payment verifier and state anchor interfaces.
//!
//! The simulation treats everything chain-facing as a collaborator behind
//! a named interface: the [`EntryVerifier`] returns a paid/unpaid verdict
//! for a session entry, and the [`AnchorSink`] consumes periodic state
//! hashes fire-and-forget. Neither failure mode ever reaches the tick
//! cycle -- verifier errors surface as `chain_rpc_unreachable` on the
//! entry path, and sink failures are logged and dropped.
//!
//! # Modules
//!
//! - [`entry_fee`] -- entry payment verification
//! - [`state_anchor`] -- periodic state hash submission

pub mod entry_fee;
pub mod state_anchor;

pub use entry_fee::{EntryVerdict, EntryVerifier, HttpEntryVerifier, StaticEntryVerifier};
pub use state_anchor::{AnchorSink, HttpAnchorSink, NullAnchorSink};

/// Errors from chain-facing collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The RPC gateway could not be reached or returned a transport error.
    #[error("chain_rpc_unreachable: {0}")]
    Unreachable(String),

    /// The gateway answered with a body this client cannot interpret.
    #[error("malformed gateway response: {0}")]
    Protocol(String),
}
