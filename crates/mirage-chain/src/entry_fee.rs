//! Entry payment verification.
//!
//! Chain-mode session entry delegates to an [`EntryVerifier`]: given the
//! caller's opaque `tx_ref` and claimed wallet address, the verifier
//! answers whether the entry fee was paid and returns the normalized
//! address. The production implementation talks to an HTTP gateway in
//! front of the entry-fee contract; tests use [`StaticEntryVerifier`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ChainError;

/// Result of a payment verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryVerdict {
    /// Whether the entry fee was paid by the claimed address.
    pub paid: bool,
    /// The canonical form of the claimed address.
    pub normalized_address: String,
}

/// Verifies that a session entry was paid for.
#[async_trait]
pub trait EntryVerifier: Send + Sync {
    /// Verify `tx_ref` against the claimed `agent_address`.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Unreachable`] when the gateway cannot be
    /// reached, or [`ChainError::Protocol`] when its answer is malformed.
    async fn verify_paid(
        &self,
        tx_ref: &str,
        agent_address: &str,
    ) -> Result<EntryVerdict, ChainError>;
}

/// Request body posted to the verification gateway.
#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    contract: &'a str,
    tx_ref: &'a str,
    agent_address: &'a str,
}

/// [`EntryVerifier`] backed by an HTTP gateway.
///
/// Posts `{contract, tx_ref, agent_address}` to the configured URL and
/// expects an [`EntryVerdict`] JSON body back.
pub struct HttpEntryVerifier {
    client: reqwest::Client,
    rpc_url: String,
    contract_address: String,
}

impl HttpEntryVerifier {
    /// Create a verifier for the given gateway URL and contract address.
    pub fn new(rpc_url: &str, contract_address: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            rpc_url: rpc_url.to_owned(),
            contract_address: contract_address.to_owned(),
        }
    }
}

#[async_trait]
impl EntryVerifier for HttpEntryVerifier {
    async fn verify_paid(
        &self,
        tx_ref: &str,
        agent_address: &str,
    ) -> Result<EntryVerdict, ChainError> {
        let request = VerifyRequest {
            contract: &self.contract_address,
            tx_ref,
            agent_address,
        };
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ChainError::Unreachable(format!(
                "gateway answered {}",
                response.status()
            )));
        }

        let verdict: EntryVerdict = response
            .json()
            .await
            .map_err(|e| ChainError::Protocol(e.to_string()))?;

        tracing::debug!(tx_ref, paid = verdict.paid, "Entry verification answered");
        Ok(verdict)
    }
}

/// [`EntryVerifier`] with a fixed answer, for tests and trust-only setups.
#[derive(Debug, Clone)]
pub struct StaticEntryVerifier {
    /// The verdict every call returns.
    pub paid: bool,
}

#[async_trait]
impl EntryVerifier for StaticEntryVerifier {
    async fn verify_paid(
        &self,
        _tx_ref: &str,
        agent_address: &str,
    ) -> Result<EntryVerdict, ChainError> {
        Ok(EntryVerdict {
            paid: self.paid,
            normalized_address: agent_address.to_lowercase(),
        })
    }
}
