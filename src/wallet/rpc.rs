//! External wallet over JSON-RPC
//!
//! Talks to a wallet daemon (Frame, a browser-extension bridge, or a dev node
//! with unlocked accounts) that exposes `eth_requestAccounts` and signs
//! `eth_sendTransaction` requests itself. The client never sees key material.

use super::{WalletError, WalletProvider};
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use async_trait::async_trait;
use url::Url;

/// Wallet reached through its JSON-RPC endpoint
#[derive(Clone)]
pub struct RpcWallet {
    url: Url,
    provider: DynProvider,
}

impl RpcWallet {
    pub fn new(url: Url) -> Self {
        let provider = ProviderBuilder::new().connect_http(url.clone()).erased();
        Self { url, provider }
    }

    /// Build around an existing provider
    pub fn with_provider(url: Url, provider: DynProvider) -> Self {
        Self { url, provider }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl WalletProvider for RpcWallet {
    fn label(&self) -> &str {
        "rpc-wallet"
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let accounts: Vec<Address> = self
            .provider
            .client()
            .request_noparams("eth_requestAccounts")
            .await?;
        tracing::debug!(count = accounts.len(), url = %self.url, "Wallet granted accounts");
        Ok(accounts)
    }

    async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(self.provider.get_accounts().await?)
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        Ok(self.provider.get_chain_id().await?)
    }

    fn provider_for(&self, _account: Address) -> Result<DynProvider, WalletError> {
        // The wallet signs; transactions carry `from` explicitly.
        Ok(self.provider.clone())
    }
}

impl std::fmt::Debug for RpcWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcWallet")
            .field("url", &self.url.as_str())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::rpc::json_rpc::ErrorPayload;
    use alloy::transports::mock::Asserter;

    fn mocked() -> (RpcWallet, Asserter) {
        let asserter = Asserter::new();
        let provider = ProviderBuilder::new()
            .connect_mocked_client(asserter.clone())
            .erased();
        let wallet = RpcWallet::with_provider("http://127.0.0.1:1248".parse().unwrap(), provider);
        (wallet, asserter)
    }

    #[tokio::test]
    async fn test_request_accounts() {
        let (wallet, asserter) = mocked();
        let account = Address::repeat_byte(0x11);
        asserter.push_success(&vec![account]);

        let accounts = wallet.request_accounts().await.unwrap();
        assert_eq!(accounts, vec![account]);
    }

    #[tokio::test]
    async fn test_user_rejection_is_classified() {
        let (wallet, asserter) = mocked();
        asserter.push_failure(ErrorPayload {
            code: 4001,
            message: "User rejected the request.".into(),
            data: None,
        });

        let err = wallet.request_accounts().await.unwrap_err();
        assert!(matches!(err, WalletError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_chain_id() {
        let (wallet, asserter) = mocked();
        asserter.push_success(&"0x7a69");
        assert_eq!(wallet.chain_id().await.unwrap(), 31337);
    }

    #[tokio::test]
    async fn test_other_rpc_errors_pass_through() {
        let (wallet, asserter) = mocked();
        asserter.push_failure_msg("method not found");

        let err = wallet.accounts().await.unwrap_err();
        assert!(matches!(err, WalletError::Rpc(_)));
    }
}
