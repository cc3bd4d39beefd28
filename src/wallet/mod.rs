//! Wallet provider boundary
//!
//! A wallet provider owns keys and signing. The client only asks it for
//! accounts, the current chain, and a provider that signs as a given account.
//! Private keys never leave the wallet implementations.

mod rpc;
mod signer;
mod simulator;
mod watcher;

pub use rpc::RpcWallet;
pub use signer::{Approval, LocalKeyWallet};
pub use simulator::{SimulationResult, TransactionSimulator};
pub use watcher::WalletWatcher;

use crate::failure::{Failure, USER_REJECTED_CODE};
use alloy::primitives::Address;
use alloy::providers::DynProvider;
use alloy::transports::TransportError;
use async_trait::async_trait;

/// Errors raised at the wallet boundary
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Request rejected by user: {0}")]
    Rejected(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("Wallet RPC error: {0}")]
    Rpc(TransportError),
}

impl From<TransportError> for WalletError {
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) if payload.code == USER_REJECTED_CODE => {
                WalletError::Rejected(payload.message.to_string())
            }
            _ => WalletError::Rpc(err),
        }
    }
}

impl From<WalletError> for Failure {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::Rejected(message) => Failure::message(message).with_code(USER_REJECTED_CODE),
            WalletError::Rpc(e) => e.into(),
            other => Failure::message(other.to_string()),
        }
    }
}

/// Notifications pushed by a wallet provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

/// A wallet that can authorise accounts and sign transactions
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Human-readable name for logs
    fn label(&self) -> &str;

    /// Ask the user for account access. May prompt.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// Accounts already authorised. Never prompts.
    async fn accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// Currently selected chain
    async fn chain_id(&self) -> Result<u64, WalletError>;

    /// A provider whose transactions are signed as `account`
    fn provider_for(&self, account: Address) -> Result<DynProvider, WalletError>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory wallet used across the crate's tests

    use super::*;
    use alloy::providers::{Provider, ProviderBuilder};
    use std::sync::Mutex;

    pub struct MockWallet {
        pub accounts: Mutex<Vec<Address>>,
        pub authorized: Mutex<bool>,
        pub chain_id: Mutex<u64>,
        pub reject: bool,
    }

    impl MockWallet {
        pub fn new(accounts: Vec<Address>) -> Self {
            Self {
                accounts: Mutex::new(accounts),
                authorized: Mutex::new(false),
                chain_id: Mutex::new(31337),
                reject: false,
            }
        }

        pub fn authorized(self) -> Self {
            *self.authorized.lock().unwrap() = true;
            self
        }

        pub fn rejecting(mut self) -> Self {
            self.reject = true;
            self
        }

        pub fn set_accounts(&self, accounts: Vec<Address>) {
            *self.accounts.lock().unwrap() = accounts;
        }

        pub fn set_chain(&self, chain_id: u64) {
            *self.chain_id.lock().unwrap() = chain_id;
        }
    }

    #[async_trait]
    impl WalletProvider for MockWallet {
        fn label(&self) -> &str {
            "mock"
        }

        async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
            if self.reject {
                return Err(WalletError::Rejected("User rejected the request.".into()));
            }
            *self.authorized.lock().unwrap() = true;
            Ok(self.accounts.lock().unwrap().clone())
        }

        async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
            if *self.authorized.lock().unwrap() {
                Ok(self.accounts.lock().unwrap().clone())
            } else {
                Ok(Vec::new())
            }
        }

        async fn chain_id(&self) -> Result<u64, WalletError> {
            Ok(*self.chain_id.lock().unwrap())
        }

        fn provider_for(&self, _account: Address) -> Result<DynProvider, WalletError> {
            let url = "http://127.0.0.1:8545".parse().unwrap();
            Ok(ProviderBuilder::new().connect_http(url).erased())
        }
    }
}
