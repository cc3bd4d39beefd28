//! Configuration for the joint account client
//!
//! Sources, lowest priority first: built-in defaults, an optional JSON file,
//! then environment variables (a `.env` file is loaded by the binary). The
//! private key is only ever read from the environment and never serialized.

pub mod rpc;

use crate::connection::ConnectionSettings;
use crate::{Error, Result};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub use rpc::RpcConfig;

/// Environment variable names
pub mod env_vars {
    pub const CONTRACT_ADDRESS: &str = "JOINT_ACCOUNT_CONTRACT_ADDRESS";
    pub const CONTRACT_ADDRESS_FALLBACK: &str = "CONTRACT_ADDRESS";
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const WATCH_INTERVAL_MS: &str = "WATCH_INTERVAL_MS";
    pub const REBIND_ON_ACCOUNT_SWITCH: &str = "REBIND_ON_ACCOUNT_SWITCH";
}

/// Main configuration
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Deployed joint account contract, validated at connection time
    #[serde(default)]
    pub contract_address: Option<String>,
    /// Chain node endpoint
    #[serde(default)]
    pub chain_rpc_url: Option<String>,
    /// External JSON-RPC wallet endpoint
    #[serde(default)]
    pub wallet_rpc_url: Option<String>,
    /// Rebind the contract handle when the wallet switches accounts
    #[serde(default)]
    pub rebind_on_account_switch: bool,
    /// Wallet polling interval (milliseconds)
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
    /// Local signing key, environment only
    #[serde(skip)]
    pub private_key: Option<SecretString>,
}

fn default_watch_interval_ms() -> u64 {
    2_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contract_address: None,
            chain_rpc_url: None,
            wallet_rpc_url: None,
            rebind_on_account_switch: false,
            watch_interval_ms: default_watch_interval_ms(),
            private_key: None,
        }
    }
}

impl Config {
    /// Load from an optional JSON file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Overlay values present in the environment
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(address) = rpc::non_empty_env(env_vars::CONTRACT_ADDRESS)
            .or_else(|| rpc::non_empty_env(env_vars::CONTRACT_ADDRESS_FALLBACK))
        {
            self.contract_address = Some(address);
        }

        let (chain, wallet) = RpcConfig::env_overrides();
        if chain.is_some() {
            self.chain_rpc_url = chain;
        }
        if wallet.is_some() {
            self.wallet_rpc_url = wallet;
        }

        if let Some(ms) = rpc::non_empty_env(env_vars::WATCH_INTERVAL_MS) {
            self.watch_interval_ms = ms.parse().map_err(|_| {
                Error::Config(format!("{} must be a number of milliseconds", env_vars::WATCH_INTERVAL_MS))
            })?;
        }

        if let Some(flag) = rpc::non_empty_env(env_vars::REBIND_ON_ACCOUNT_SWITCH) {
            self.rebind_on_account_switch = parse_flag(&flag)?;
        }

        if let Some(key) = rpc::non_empty_env(env_vars::PRIVATE_KEY) {
            self.private_key = Some(SecretString::from(key));
        }

        Ok(())
    }

    pub fn rpc(&self) -> Result<RpcConfig> {
        RpcConfig::resolve(
            self.chain_rpc_url.as_deref(),
            self.wallet_rpc_url.as_deref(),
        )
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            contract_address: self.contract_address.clone(),
            rebind_on_account_switch: self.rebind_on_account_switch,
            watch_interval: Duration::from_millis(self.watch_interval_ms.max(1)),
        }
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("Invalid boolean value: {}", other))),
    }
}
