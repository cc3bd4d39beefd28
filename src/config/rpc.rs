//! RPC endpoint configuration
//!
//! Two endpoints matter to the client:
//! 1. The chain node (`ETH_RPC_URL`) used for reads and, with a local key, for
//!    submitting signed transactions
//! 2. The external wallet (`WALLET_RPC_URL`), a JSON-RPC wallet that handles
//!    account access and signing itself
//!
//! # Examples
//!
//! ```bash
//! # Local development node
//! export ETH_RPC_URL="http://127.0.0.1:8545"
//!
//! # Frame or another JSON-RPC wallet
//! export WALLET_RPC_URL="http://127.0.0.1:1248"
//! ```

use crate::{Error, Result};
use url::Url;

/// Environment variable names
pub mod env_vars {
    pub const ETH_RPC_URL: &str = "ETH_RPC_URL";
    pub const WALLET_RPC_URL: &str = "WALLET_RPC_URL";
}

/// Default chain endpoint: a local development node
pub const DEFAULT_CHAIN_RPC_URL: &str = "http://127.0.0.1:8545";

/// Resolved endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    pub chain: Url,
    pub wallet: Option<Url>,
}

impl RpcConfig {
    /// Resolve from explicit values, falling back to the local node
    pub fn resolve(chain: Option<&str>, wallet: Option<&str>) -> Result<Self> {
        let chain = match chain {
            Some(url) => parse_endpoint(url)?,
            None => {
                tracing::debug!("No chain RPC configured, using local node");
                parse_endpoint(DEFAULT_CHAIN_RPC_URL)?
            }
        };
        let wallet = wallet.map(parse_endpoint).transpose()?;
        Ok(Self { chain, wallet })
    }

    /// Endpoint values from the environment, unset or empty treated as absent
    pub fn env_overrides() -> (Option<String>, Option<String>) {
        (
            non_empty_env(env_vars::ETH_RPC_URL),
            non_empty_env(env_vars::WALLET_RPC_URL),
        )
    }
}

/// Parse and validate an endpoint. Only http(s) is accepted since every
/// provider is built over an HTTP transport.
pub fn parse_endpoint(raw: &str) -> Result<Url> {
    let url: Url = raw
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid RPC URL {:?}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Config(format!(
            "Unsupported RPC URL scheme {:?} in {:?}",
            other, raw
        ))),
    }
}

pub(crate) fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
