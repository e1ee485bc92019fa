//! Environment-driven runtime settings.
//!
//! All tunables come from the process environment with sensible defaults;
//! a malformed numeric value is a startup error, never a silent fallback.
//! Presence of both `CHAIN_RPC_URL` and `ENTRY_FEE_CONTRACT_ADDRESS`
//! switches session entry from trust mode to chain mode.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Errors that can occur while loading settings from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held a value that failed to parse.
    #[error("invalid value for {name}: {value:?}")]
    Invalid {
        /// The environment variable name.
        name: &'static str,
        /// The offending raw value.
        value: String,
    },
}

/// Runtime settings for the server, scheduler, and session gate.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path of the `SQLite` database file.
    pub db_path: String,
    /// Milliseconds between scheduler ticks.
    pub tick_interval_ms: u64,
    /// Write a world snapshot every this many resolved ticks.
    pub snapshot_every_ticks: u64,
    /// Side length of the square world grid.
    pub map_size: i32,
    /// Chebyshev radius of the observation tile window.
    pub obs_radius: i32,
    /// Asset the entry fee is quoted in.
    pub entry_price_asset: String,
    /// Entry fee amount in the quoted asset.
    pub entry_price_amount: Decimal,
    /// Prefix secret accepted for trust-mode entry references.
    pub entry_demo_secret: String,
    /// RPC gateway for the chain-mode entry verifier, if configured.
    pub chain_rpc_url: Option<String>,
    /// Entry-fee contract address for chain-mode entry, if configured.
    pub entry_fee_contract_address: Option<String>,
    /// Endpoint the anchor sink posts state hashes to, if configured.
    pub anchor_sink_url: Option<String>,
    /// Socket address the HTTP server binds to.
    pub bind_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: String::from("mirage.sqlite3"),
            tick_interval_ms: 1200,
            snapshot_every_ticks: 10,
            map_size: 20,
            obs_radius: 3,
            entry_price_asset: String::from("USDC"),
            entry_price_amount: Decimal::new(10, 1),
            entry_demo_secret: String::from("demo"),
            chain_rpc_url: None,
            entry_fee_contract_address: None,
            anchor_sink_url: None,
            bind_addr: String::from("0.0.0.0:8000"),
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a numeric variable is present
    /// but unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            db_path: var_or("DB_PATH", &defaults.db_path),
            tick_interval_ms: parse_var("TICK_INTERVAL_MS", defaults.tick_interval_ms)?,
            snapshot_every_ticks: parse_var("SNAPSHOT_EVERY_TICKS", defaults.snapshot_every_ticks)?,
            map_size: parse_var("MAP_SIZE", defaults.map_size)?,
            obs_radius: parse_var("OBS_RADIUS", defaults.obs_radius)?,
            entry_price_asset: var_or("ENTRY_PRICE_ASSET", &defaults.entry_price_asset),
            entry_price_amount: parse_var("ENTRY_PRICE_AMOUNT", defaults.entry_price_amount)?,
            entry_demo_secret: var_or("ENTRY_DEMO_SECRET", &defaults.entry_demo_secret),
            chain_rpc_url: var_opt("CHAIN_RPC_URL"),
            entry_fee_contract_address: var_opt("ENTRY_FEE_CONTRACT_ADDRESS"),
            anchor_sink_url: var_opt("ANCHOR_SINK_URL"),
            bind_addr: var_or("BIND_ADDR", &defaults.bind_addr),
        })
    }

    /// Whether chain-mode entry verification is enabled.
    pub const fn chain_mode(&self) -> bool {
        self.chain_rpc_url.is_some() && self.entry_fee_contract_address.is_some()
    }

    /// The `tx_ref` prefix accepted in trust mode.
    pub fn demo_prefix(&self) -> String {
        format!("{}_", self.entry_demo_secret)
    }
}

/// Read a variable, falling back to the given default.
fn var_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_owned())
}

/// Read an optional variable; empty values count as absent.
fn var_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Parse a variable into `T`, falling back to the given default when absent.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) if !raw.is_empty() => raw.parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
        }),
        _ => Ok(default),
    }
}
