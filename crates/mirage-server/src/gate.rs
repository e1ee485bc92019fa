//! Session entry: fee quoting and entry confirmation.
//!
//! Entry runs in one of two modes. In trust mode the caller presents a
//! `tx_ref` carrying the demo prefix; in chain mode (both chain settings
//! present) the caller must also present a wallet address, and the entry
//! verifier returns the paid/unpaid verdict.
//!
//! On success the gate mints fresh credentials, registers the agent under
//! the world lock -- regenerating the world first if the extinction
//! condition holds -- and persists the agent row, entry record, and
//! events under the database lock. A snapshot is written in the same
//! critical section so a crash right after entry still recovers the new
//! agent (and any extinction reset).

use serde::{Deserialize, Serialize};
use tracing::info;

use mirage_types::{AgentEnteredDetails, AgentId, ApiKey, EventType};

use crate::error::ApiError;
use crate::state::AppState;

/// Response of `POST /entry/quote`.
#[derive(Debug, Clone, Serialize)]
pub struct EntryQuote {
    /// Asset the entry fee is denominated in.
    pub asset: String,
    /// Fee amount as a decimal string.
    pub amount: String,
    /// Payment protocol identifier.
    pub protocol: String,
    /// Human-oriented payment instructions.
    pub instructions: serde_json::Value,
}

/// Request body of `POST /entry/confirm`.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryConfirmRequest {
    /// Opaque payment reference.
    pub tx_ref: String,
    /// Optional display name for the new agent.
    #[serde(default)]
    pub name: Option<String>,
    /// Wallet address; required in chain mode.
    #[serde(default)]
    pub agent_address: Option<String>,
}

/// Response of `POST /entry/confirm`.
#[derive(Debug, Clone, Serialize)]
pub struct EntryGrant {
    /// The minted agent identifier.
    pub agent_id: AgentId,
    /// The minted API token.
    pub api_key: ApiKey,
}

/// Build the entry quote from the configured pricing.
pub fn quote(state: &AppState) -> EntryQuote {
    let settings = &state.settings;
    EntryQuote {
        asset: settings.entry_price_asset.clone(),
        amount: settings.entry_price_amount.to_string(),
        protocol: String::from("x402"),
        instructions: serde_json::json!({
            "demo": {
                "confirm_endpoint": "/entry/confirm",
                "tx_ref_format": format!("{}<anything>", settings.demo_prefix()),
            }
        }),
    }
}

/// Verify payment, admit the agent, and persist the entry.
///
/// # Errors
///
/// Returns the entry-path error taxonomy: `missing_agent_address`,
/// `payment_required`, or `chain_rpc_unreachable` in chain mode;
/// `invalid_tx_ref` in trust mode; database errors as 500s.
pub async fn confirm_entry(
    state: &AppState,
    request: &EntryConfirmRequest,
) -> Result<EntryGrant, ApiError> {
    let settings = &state.settings;

    let wallet_address = if settings.chain_mode() {
        let Some(address) = request.agent_address.as_deref().filter(|a| !a.is_empty()) else {
            return Err(ApiError::MissingAgentAddress);
        };
        let verdict = state.verifier.verify_paid(&request.tx_ref, address).await?;
        if !verdict.paid {
            return Err(ApiError::PaymentRequired);
        }
        Some(verdict.normalized_address)
    } else {
        if request.tx_ref.len() < 3 || !request.tx_ref.starts_with(&settings.demo_prefix()) {
            return Err(ApiError::InvalidTxRef);
        }
        None
    };

    let agent_id = AgentId::new();
    let api_key = ApiKey::new();

    // Register under the world lock; extinction triggers a fresh round.
    let (did_reset, agent_json, tick, world_json) = {
        let mut sim = state.sim.lock().await;
        let did_reset = sim.world.alive_count() == 0;
        if did_reset {
            sim.world.reset_session();
            sim.pending.clear();
        }
        sim.world.add_agent(agent_id.clone());
        if let Some(agent) = sim.world.agents.get_mut(&agent_id) {
            agent.name = request.name.clone().filter(|n| !n.is_empty());
            agent.wallet_address = wallet_address;
        }
        let agent_json = sim
            .world
            .agents
            .get(&agent_id)
            .map(serde_json::to_string)
            .transpose()?
            .unwrap_or_default();
        let world_json = serde_json::to_string(&sim.world)?;
        (did_reset, agent_json, sim.world.tick, world_json)
    };

    // Persist under the database lock, after the world lock is released.
    {
        let db = state.db.lock().await;
        db.agents().upsert(&agent_id, &api_key, &agent_json).await?;
        db.entries()
            .insert(
                &request.tx_ref,
                &agent_id,
                &settings.entry_price_asset,
                &settings.entry_price_amount.to_string(),
            )
            .await?;
        let entered = AgentEnteredDetails {
            agent_id: agent_id.clone(),
            name: request
                .name
                .clone()
                .unwrap_or_else(|| agent_id.to_string()),
            demo: None,
        };
        db.events()
            .insert(
                tick,
                EventType::AgentEntered.as_str(),
                Some(&agent_id),
                &serde_json::to_value(&entered)?,
            )
            .await?;
        if did_reset {
            db.events()
                .insert(
                    tick,
                    EventType::WorldResetIfExtinct.as_str(),
                    None,
                    &serde_json::json!({"reason": "no_alive_agents"}),
                )
                .await?;
        }
        db.snapshots().upsert(tick, &world_json).await?;
    }

    info!(agent_id = %agent_id, did_reset, tick, "Agent entered");
    Ok(EntryGrant { agent_id, api_key })
}
