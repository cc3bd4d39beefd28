//! Wallet change notifications
//!
//! JSON-RPC wallets do not push `accountsChanged` / `chainChanged`, so the
//! watcher polls the wallet and publishes differences on a broadcast channel.
//! Dropping the watcher cancels the poll task and closes the channel.

use super::{WalletEvent, WalletProvider};
use alloy::primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

const EVENT_CAPACITY: usize = 16;

pub struct WalletWatcher {
    handle: JoinHandle<()>,
    events: broadcast::Sender<WalletEvent>,
}

impl WalletWatcher {
    /// Start polling `wallet`, comparing against the given starting state
    pub fn spawn(
        wallet: Arc<dyn WalletProvider>,
        interval: Duration,
        accounts: Vec<Address>,
        chain_id: u64,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let tx = events.clone();

        let handle = tokio::spawn(async move {
            let mut accounts = accounts;
            let mut chain_id = chain_id;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                match wallet.chain_id().await {
                    Ok(current) if current != chain_id => {
                        debug!(from = chain_id, to = current, "Wallet chain changed");
                        chain_id = current;
                        let _ = tx.send(WalletEvent::ChainChanged(current));
                    }
                    Ok(_) => {}
                    Err(e) => warn!(wallet = wallet.label(), error = %e, "Failed to poll wallet chain"),
                }

                match wallet.accounts().await {
                    Ok(current) if current != accounts => {
                        debug!(count = current.len(), "Wallet accounts changed");
                        accounts = current.clone();
                        let _ = tx.send(WalletEvent::AccountsChanged(current));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(wallet = wallet.label(), error = %e, "Failed to poll wallet accounts")
                    }
                }
            }
        });

        Self { handle, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    /// Stop polling; existing receivers see the channel close
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for WalletWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
