//! Periodic state hash submission.
//!
//! Every 50th tick the resolver computes a canonical state hash; the
//! scheduler hands it to an [`AnchorSink`] fire-and-forget. A sink never
//! surfaces failure to the simulation -- it reports success as a plain
//! boolean and logs its own problems.

use async_trait::async_trait;
use serde::Serialize;

/// Consumes anchored state hashes for external attestation.
#[async_trait]
pub trait AnchorSink: Send + Sync {
    /// Submit one anchored hash. Returns whether the submission landed.
    async fn anchor_state(&self, tick: u64, state_hash: &str, alive_agents: usize) -> bool;
}

/// Body posted to the anchor endpoint.
#[derive(Debug, Serialize)]
struct AnchorRequest<'a> {
    tick: u64,
    state_hash: &'a str,
    alive_agents: usize,
}

/// [`AnchorSink`] backed by an HTTP endpoint.
pub struct HttpAnchorSink {
    client: reqwest::Client,
    url: String,
}

impl HttpAnchorSink {
    /// Create a sink posting to the given URL.
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_owned(),
        }
    }
}

#[async_trait]
impl AnchorSink for HttpAnchorSink {
    async fn anchor_state(&self, tick: u64, state_hash: &str, alive_agents: usize) -> bool {
        let request = AnchorRequest {
            tick,
            state_hash,
            alive_agents,
        };
        match self.client.post(&self.url).json(&request).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(tick, state_hash, "State anchor submitted");
                true
            }
            Ok(response) => {
                tracing::warn!(tick, status = %response.status(), "State anchor rejected");
                false
            }
            Err(error) => {
                tracing::warn!(tick, %error, "State anchor submission failed");
                false
            }
        }
    }
}

/// [`AnchorSink`] that drops every hash, for setups without anchoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAnchorSink;

#[async_trait]
impl AnchorSink for NullAnchorSink {
    async fn anchor_state(&self, tick: u64, state_hash: &str, _alive_agents: usize) -> bool {
        tracing::debug!(tick, state_hash, "Anchor sink disabled; hash dropped");
        false
    }
}
