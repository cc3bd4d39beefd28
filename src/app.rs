//! Top-level application state
//!
//! [`AppContext`] is the explicit context passed to the orchestrator and the
//! form surfaces: it owns the session, the single-flight gate, the banner and
//! the notifier. [`App`] adds the connection manager and the lifecycle
//! (silent reconnect at start, connect, reload on network change).

use crate::connection::{ConnectionManager, SessionEvent};
use crate::contract::ContractCall;
use crate::error::{ConnectionError, OrchestrationError};
use crate::notify::{NotificationId, Notifier};
use crate::orchestrator::Orchestrator;
use crate::session::Session;
use crate::wallet::WalletEvent;
use alloy::primitives::Address;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

pub const MSG_CONNECTED: &str = "Wallet connected successfully!";

/// What the user should currently see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppView {
    Disconnected {
        wallet_installed: bool,
        loading: bool,
    },
    Connected {
        address: Address,
        banner: Option<String>,
    },
}

/// Shared state of the running application
#[derive(Debug)]
pub struct AppContext {
    session: RwLock<Option<Session>>,
    banner: RwLock<Option<String>>,
    loading: AtomicBool,
    orchestrator: Orchestrator,
    notifier: Notifier,
}

impl AppContext {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            session: RwLock::new(None),
            banner: RwLock::new(None),
            loading: AtomicBool::new(true),
            orchestrator: Orchestrator::new(notifier.clone()),
            notifier,
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// True while a transaction is in flight; forms stay disabled
    pub fn is_processing(&self) -> bool {
        self.orchestrator.is_pending()
    }

    pub async fn banner(&self) -> Option<String> {
        self.banner.read().await.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        self.loading.store(loading, Ordering::SeqCst);
    }

    pub(crate) async fn set_session(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }

    pub(crate) async fn set_banner(&self, banner: Option<String>) {
        *self.banner.write().await = banner;
    }

    pub async fn view(&self, wallet_installed: bool) -> AppView {
        match self.session().await {
            Some(session) => AppView::Connected {
                address: session.connected_address,
                banner: self.banner().await,
            },
            None => AppView::Disconnected {
                wallet_installed,
                loading: self.is_loading(),
            },
        }
    }

    async fn dispatch(
        &self,
        call: Result<ContractCall, crate::failure::Failure>,
        success_message: &str,
        error_prefix: &str,
    ) -> Result<bool, OrchestrationError> {
        let session = self.session().await;
        self.orchestrator
            .submit(
                session,
                |session| async move {
                    let call = call?;
                    call.send(&session.contract, session.signer_address).await
                },
                success_message,
                error_prefix,
            )
            .await
    }

    pub async fn register_user(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<bool, OrchestrationError> {
        self.dispatch(
            ContractCall::register_user(user_id, name),
            "User registered successfully!",
            "Registration failed",
        )
        .await
    }

    /// `initial_balance` is a decimal ether amount
    pub async fn create_account(
        &self,
        user1: &str,
        user2: &str,
        initial_balance: &str,
    ) -> Result<bool, OrchestrationError> {
        self.dispatch(
            ContractCall::create_account(user1, user2, initial_balance),
            "Account created successfully!",
            "Account creation failed",
        )
        .await
    }

    /// `amount` is a decimal ether amount
    pub async fn send_amount(
        &self,
        from: &str,
        to: &str,
        amount: &str,
    ) -> Result<bool, OrchestrationError> {
        self.dispatch(
            ContractCall::send_amount(from, to, amount),
            "Transfer completed successfully!",
            "Transfer failed",
        )
        .await
    }

    pub async fn close_account(&self, user1: &str, user2: &str) -> Result<bool, OrchestrationError> {
        self.dispatch(
            ContractCall::close_account(user1, user2),
            "Account closed successfully!",
            "Account closure failed",
        )
        .await
    }
}

/// The application: context plus connection lifecycle
pub struct App {
    context: AppContext,
    connection: ConnectionManager,
}

impl App {
    pub fn new(connection: ConnectionManager, notifier: Notifier) -> Self {
        Self {
            context: AppContext::new(notifier),
            connection,
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn wallet_installed(&self) -> bool {
        self.connection.wallet_installed()
    }

    pub async fn view(&self) -> AppView {
        self.context.view(self.wallet_installed()).await
    }

    /// Start-up: reconnect silently if the wallet already authorised an account
    pub async fn init(&mut self) {
        if self.connection.wallet_installed() {
            match self.connection.authorized_accounts().await {
                Ok(accounts) if !accounts.is_empty() => {
                    // Failures are already on the banner
                    let _ = self.connect().await;
                }
                Ok(_) => info!("Wallet has no authorised account, waiting for connect"),
                Err(e) => warn!(error = %e, "Failed to initialize wallet connection"),
            }
        }
        self.context.set_loading(false);
    }

    /// Connect the wallet, recording the outcome in the session and banner
    pub async fn connect(&mut self) -> Result<(), ConnectionError> {
        self.context.set_loading(true);
        self.context.set_banner(None).await;

        let result = self.connection.connect().await;
        let outcome = match result {
            Ok(session) => {
                self.context.set_session(Some(session)).await;
                self.context
                    .notifier()
                    .success(&NotificationId::unique(), MSG_CONNECTED);
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "Wallet connection failed");
                self.connection.disconnect();
                self.context.set_session(None).await;
                self.context.set_banner(Some(message.clone())).await;
                self.context.notifier().error_once(message);
                Err(e)
            }
        };

        self.context.set_loading(false);
        outcome
    }

    /// Drop the session and all wallet subscriptions
    pub async fn disconnect(&mut self) {
        self.connection.disconnect();
        self.context.set_session(None).await;
    }

    /// Wallet events of the current connection, if any
    pub fn wallet_events(&self) -> Option<broadcast::Receiver<WalletEvent>> {
        self.connection.subscribe()
    }

    /// Apply a wallet event; a network change re-runs start-up
    pub async fn handle_wallet_event(&mut self, event: &WalletEvent) -> SessionEvent {
        let outcome = {
            let mut session = self.context.session.write().await;
            self.connection.apply(event, &mut session)
        };

        match &outcome {
            SessionEvent::Disconnected => {
                self.connection.disconnect();
                self.context
                    .notifier()
                    .info("Wallet disconnected. Connect again to continue.");
            }
            SessionEvent::AccountChanged { address, rebound } => {
                let note = if *rebound {
                    format!("Switched to account {}", address)
                } else {
                    format!(
                        "Switched to account {}; transactions are still signed by the original account",
                        address
                    )
                };
                self.context.notifier().info(note);
            }
            SessionEvent::ReloadRequired => self.reload().await,
            SessionEvent::Unchanged => {}
        }

        outcome
    }

    async fn reload(&mut self) {
        info!("Reloading after network change");
        self.disconnect().await;
        self.context.set_banner(None).await;
        self.init().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionSettings;
    use crate::notify::Level;
    use crate::wallet::mock::MockWallet;
    use crate::wallet::WalletProvider;
    use std::sync::Arc;
    use std::time::Duration;

    const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    fn settings() -> ConnectionSettings {
        ConnectionSettings {
            contract_address: Some(CONTRACT.to_string()),
            rebind_on_account_switch: false,
            watch_interval: Duration::from_millis(10),
        }
    }

    fn app_with(wallet: Option<Arc<dyn WalletProvider>>) -> App {
        App::new(ConnectionManager::new(wallet, settings()), Notifier::new())
    }

    #[tokio::test]
    async fn test_wallet_absent() {
        let mut app = app_with(None);
        app.init().await;
        assert_eq!(
            app.view().await,
            AppView::Disconnected {
                wallet_installed: false,
                loading: false
            }
        );

        let err = app.connect().await.unwrap_err();
        assert_eq!(err, ConnectionError::NoWalletInstalled);
        assert!(app.context().session().await.is_none());
        assert!(app.context().banner().await.is_some());
    }

    #[tokio::test]
    async fn test_init_reconnects_silently_when_authorised() {
        let account = Address::repeat_byte(1);
        let wallet = Arc::new(MockWallet::new(vec![account]).authorized());
        let mut app = app_with(Some(wallet));
        app.init().await;

        assert_eq!(
            app.view().await,
            AppView::Connected {
                address: account,
                banner: None
            }
        );
    }

    #[tokio::test]
    async fn test_init_does_not_prompt_when_unauthorised() {
        let wallet = Arc::new(MockWallet::new(vec![Address::repeat_byte(1)]));
        let mut app = app_with(Some(wallet.clone()));
        app.init().await;

        assert!(!app.context().is_connected().await);
        assert!(!*wallet.authorized.lock().unwrap());
    }

    #[tokio::test]
    async fn test_rejected_connection_sets_banner() {
        let wallet = Arc::new(MockWallet::new(vec![Address::repeat_byte(1)]).rejecting());
        let mut app = app_with(Some(wallet));
        let mut rx = app.context().notifier().subscribe();

        assert_eq!(app.connect().await, Err(ConnectionError::UserRejected));
        assert_eq!(
            app.context().banner().await.as_deref(),
            Some("Wallet connection rejected by user")
        );
        let note = rx.try_recv().unwrap();
        assert_eq!(note.level, Level::Error);
    }

    #[tokio::test]
    async fn test_empty_account_list_reverts_to_disconnected_view() {
        let account = Address::repeat_byte(1);
        let wallet = Arc::new(MockWallet::new(vec![account]));
        let mut app = app_with(Some(wallet));
        app.connect().await.unwrap();

        let event = app
            .handle_wallet_event(&WalletEvent::AccountsChanged(vec![]))
            .await;
        assert_eq!(event, SessionEvent::Disconnected);
        assert!(matches!(app.view().await, AppView::Disconnected { .. }));
        assert!(app.wallet_events().is_none());
    }

    #[tokio::test]
    async fn test_network_change_reloads() {
        let account = Address::repeat_byte(1);
        let wallet = Arc::new(MockWallet::new(vec![account]));
        let mut app = app_with(Some(wallet.clone()));
        app.connect().await.unwrap();

        wallet.set_chain(1);
        let event = app.handle_wallet_event(&WalletEvent::ChainChanged(1)).await;
        assert_eq!(event, SessionEvent::ReloadRequired);

        // Account was authorised, so start-up reconnects on the new chain
        let session = app.context().session().await.unwrap();
        assert_eq!(session.chain_id, 1);
    }

    #[tokio::test]
    async fn test_callbacks_without_session_are_noops() {
        let app = app_with(None);
        assert_eq!(app.context().register_user("1", "alice").await, Ok(false));
        assert_eq!(app.context().send_amount("1", "2", "0.5").await, Ok(false));
        assert!(!app.context().is_processing());
    }

    #[tokio::test]
    async fn test_invalid_input_is_classified_preflight() {
        let wallet = Arc::new(MockWallet::new(vec![Address::repeat_byte(1)]));
        let mut app = app_with(Some(wallet));
        app.connect().await.unwrap();
        let mut rx = app.context().notifier().subscribe();

        let err = app
            .context()
            .send_amount("one", "2", "0.5")
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::TransactionFailed(_)));
        assert!(!app.context().is_processing());

        let mut last = None;
        while let Ok(n) = rx.try_recv() {
            last = Some(n);
        }
        let last = last.unwrap();
        assert_eq!(last.level, Level::Error);
        assert!(last.message.starts_with("Transfer failed: invalid user id"));
    }
}
