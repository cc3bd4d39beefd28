//! Local private-key wallet
//!
//! SECURITY: This is the ONLY place where private keys exist.
//! - Keys arrive wrapped in `SecretString` and are parsed straight into
//!   alloy's PrivateKeySigner
//! - Keys are never serialized or logged
//! - Only the derived address leaves this module

use super::{WalletError, WalletProvider};
use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

/// Callback asked before the wallet hands out its account
pub type Approval = Arc<dyn Fn(Address) -> bool + Send + Sync>;

/// Wallet backed by a single private key
pub struct LocalKeyWallet {
    signer: PrivateKeySigner,
    /// Public address (safe to expose)
    address: Address,
    rpc_url: Url,
    /// Read-only provider for chain queries
    chain: DynProvider,
    approval: Option<Approval>,
    authorized: AtomicBool,
}

impl LocalKeyWallet {
    /// Create a wallet from a hex-encoded private key held as a secret
    pub fn from_secret(key: &SecretString, rpc_url: Url) -> Result<Self, WalletError> {
        let key_hex = key.expose_secret();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| WalletError::InvalidKey(format!("{}", e)))?;

        let address = signer.address();
        let chain = ProviderBuilder::new().connect_http(rpc_url.clone()).erased();

        Ok(Self {
            signer,
            address,
            rpc_url,
            chain,
            approval: None,
            authorized: AtomicBool::new(true),
        })
    }

    /// Require `approval` to grant account access before the key is used.
    ///
    /// Until approved, [`WalletProvider::accounts`] reports no accounts.
    pub fn with_approval(mut self, approval: Approval) -> Self {
        self.approval = Some(approval);
        self.authorized = AtomicBool::new(false);
        self
    }

    /// Get the public address (safe to share)
    pub fn address(&self) -> Address {
        self.address
    }
}

#[async_trait]
impl WalletProvider for LocalKeyWallet {
    fn label(&self) -> &str {
        "local-key"
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        if self.authorized.load(Ordering::SeqCst) {
            return Ok(vec![self.address]);
        }

        if let Some(approval) = self.approval.clone() {
            let address = self.address;
            let approved = tokio::task::spawn_blocking(move || approval(address))
                .await
                .unwrap_or(false);
            if !approved {
                return Err(WalletError::Rejected("User rejected the request.".to_string()));
            }
        }

        self.authorized.store(true, Ordering::SeqCst);
        Ok(vec![self.address])
    }

    async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        if self.authorized.load(Ordering::SeqCst) {
            Ok(vec![self.address])
        } else {
            Ok(Vec::new())
        }
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        Ok(self.chain.get_chain_id().await?)
    }

    fn provider_for(&self, account: Address) -> Result<DynProvider, WalletError> {
        if account != self.address {
            return Err(WalletError::Rejected(format!(
                "account {} is not managed by this wallet",
                account
            )));
        }

        let wallet = EthereumWallet::from(self.signer.clone());
        Ok(ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.rpc_url.clone())
            .erased())
    }
}

// Implement Debug manually to avoid exposing the signer
impl std::fmt::Debug for LocalKeyWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeyWallet")
            .field("address", &self.address)
            .field("rpc_url", &self.rpc_url.as_str())
            .field("signer", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key, DO NOT use in production!
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn test_wallet() -> LocalKeyWallet {
        let key = SecretString::from(TEST_KEY.to_string());
        LocalKeyWallet::from_secret(&key, "http://127.0.0.1:8545".parse().unwrap()).unwrap()
    }

    #[test]
    fn test_wallet_from_secret() {
        let wallet = test_wallet();
        assert_eq!(
            format!("{:?}", wallet.address()).to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_invalid_key() {
        let key = SecretString::from("0x1234".to_string());
        let err = LocalKeyWallet::from_secret(&key, "http://127.0.0.1:8545".parse().unwrap())
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidKey(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug_str = format!("{:?}", test_wallet());
        assert!(!debug_str.contains("ac0974bec"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_accounts_without_approval_are_authorized() {
        let wallet = test_wallet();
        assert_eq!(wallet.accounts().await.unwrap(), vec![wallet.address()]);
    }

    #[tokio::test]
    async fn test_declined_approval_rejects() {
        let wallet = test_wallet().with_approval(Arc::new(|_| false));
        assert!(wallet.accounts().await.unwrap().is_empty());

        let err = wallet.request_accounts().await.unwrap_err();
        assert!(matches!(err, WalletError::Rejected(_)));
        assert!(wallet.accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_granted_approval_authorizes() {
        let wallet = test_wallet().with_approval(Arc::new(|_| true));
        let accounts = wallet.request_accounts().await.unwrap();
        assert_eq!(accounts, vec![wallet.address()]);
        assert_eq!(wallet.accounts().await.unwrap(), accounts);
    }

    #[test]
    fn test_provider_for_foreign_account_fails() {
        let wallet = test_wallet();
        assert!(wallet.provider_for(Address::ZERO).is_err());
        assert!(wallet.provider_for(wallet.address()).is_ok());
    }
}
