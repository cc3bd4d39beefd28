//! Wallet connection management
//!
//! Establishes a session against the configured wallet, binds the contract
//! handle, and turns wallet events into session transitions.

use crate::classify::classify;
use crate::contract;
use crate::error::ConnectionError;
use crate::failure::Failure;
use crate::session::Session;
use crate::wallet::{WalletError, WalletEvent, WalletProvider, WalletWatcher};
use alloy::primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// What a wallet event did to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Account list emptied, the user must reconnect
    Disconnected,
    /// Displayed account changed; `rebound` tells whether signing follows it
    AccountChanged { address: Address, rebound: bool },
    /// Network switched, the application must start over
    ReloadRequired,
    Unchanged,
}

/// Connection parameters taken from configuration
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Raw configured address, validated at connect time
    pub contract_address: Option<String>,
    pub rebind_on_account_switch: bool,
    pub watch_interval: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            contract_address: None,
            rebind_on_account_switch: false,
            watch_interval: Duration::from_secs(2),
        }
    }
}

pub struct ConnectionManager {
    wallet: Option<Arc<dyn WalletProvider>>,
    settings: ConnectionSettings,
    watcher: Option<WalletWatcher>,
}

impl ConnectionManager {
    pub fn new(wallet: Option<Arc<dyn WalletProvider>>, settings: ConnectionSettings) -> Self {
        Self {
            wallet,
            settings,
            watcher: None,
        }
    }

    pub fn wallet_installed(&self) -> bool {
        self.wallet.is_some()
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Request account access and bind the contract
    pub async fn connect(&mut self) -> Result<Session, ConnectionError> {
        let wallet = self
            .wallet
            .clone()
            .ok_or(ConnectionError::NoWalletInstalled)?;

        let accounts = wallet
            .request_accounts()
            .await
            .map_err(connection_error)?;
        let account = *accounts.first().ok_or(ConnectionError::UserRejected)?;

        let contract_address =
            validate_contract_address(self.settings.contract_address.as_deref().unwrap_or(""))?;

        let provider = wallet.provider_for(account).map_err(connection_error)?;
        let chain_id = wallet.chain_id().await.map_err(connection_error)?;
        let contract = contract::bind(contract_address, provider);

        // Replace any subscriptions from an earlier connection
        self.disconnect();
        self.watcher = Some(WalletWatcher::spawn(
            wallet.clone(),
            self.settings.watch_interval,
            accounts,
            chain_id,
        ));

        info!(
            wallet = wallet.label(),
            account = %account,
            chain_id = chain_id,
            contract = %contract_address,
            "Wallet connected"
        );

        Ok(Session::new(account, chain_id, contract))
    }

    /// Accounts the wallet has already authorised, without prompting
    pub async fn authorized_accounts(&self) -> Result<Vec<Address>, ConnectionError> {
        match &self.wallet {
            Some(wallet) => wallet.accounts().await.map_err(connection_error),
            None => Ok(Vec::new()),
        }
    }

    /// Subscribe to wallet events of the current connection
    pub fn subscribe(&self) -> Option<broadcast::Receiver<WalletEvent>> {
        self.watcher.as_ref().map(WalletWatcher::subscribe)
    }

    /// Stop watching the wallet and drop all subscriptions
    pub fn disconnect(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            debug!("Removing wallet subscriptions");
            watcher.stop();
        }
    }

    /// Apply a wallet event to the session
    pub fn apply(&self, event: &WalletEvent, session: &mut Option<Session>) -> SessionEvent {
        match event {
            WalletEvent::ChainChanged(chain_id) => {
                info!(chain_id = chain_id, "Network changed, reloading");
                *session = None;
                SessionEvent::ReloadRequired
            }
            WalletEvent::AccountsChanged(accounts) => {
                let Some(current) = session.as_mut() else {
                    return SessionEvent::Unchanged;
                };

                let Some(&address) = accounts.first() else {
                    info!("Wallet reported no accounts, clearing session");
                    *session = None;
                    return SessionEvent::Disconnected;
                };

                if address == current.connected_address {
                    return SessionEvent::Unchanged;
                }

                current.connected_address = address;
                let rebound = self.settings.rebind_on_account_switch && self.rebind(current);
                if !rebound {
                    warn!(
                        displayed = %address,
                        signer = %current.signer_address,
                        "Account switched; contract calls still sign as the original account"
                    );
                }
                SessionEvent::AccountChanged { address, rebound }
            }
        }
    }

    fn rebind(&self, session: &mut Session) -> bool {
        let Some(wallet) = &self.wallet else {
            return false;
        };

        match wallet.provider_for(session.connected_address) {
            Ok(provider) => {
                session.contract = contract::bind(session.contract_address(), provider);
                session.signer_address = session.connected_address;
                info!(account = %session.signer_address, "Rebound contract to new account");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to rebind contract to new account");
                false
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn connection_error(err: WalletError) -> ConnectionError {
    match err {
        WalletError::Rejected(_) => ConnectionError::UserRejected,
        other => ConnectionError::Provider(classify(&Failure::from(other))),
    }
}

/// Validate a configured contract address.
///
/// All-lowercase or all-uppercase hex is accepted as is; mixed case must be a
/// valid EIP-55 checksum.
pub fn validate_contract_address(raw: &str) -> Result<Address, ConnectionError> {
    let trimmed = raw.trim();
    let invalid = |reason: String| ConnectionError::InvalidConfiguration(reason);

    if trimmed.is_empty() {
        return Err(invalid("contract address is not set".to_string()));
    }

    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let mixed_case = hex.chars().any(|c| c.is_ascii_lowercase())
        && hex.chars().any(|c| c.is_ascii_uppercase());

    let parsed = if mixed_case {
        let prefixed = format!("0x{}", hex);
        Address::parse_checksummed(&prefixed, None).map_err(|e| e.to_string())
    } else {
        hex.parse::<Address>().map_err(|e| e.to_string())
    };

    parsed.map_err(|e| invalid(format!("{:?}: {}", trimmed, e)))
}
