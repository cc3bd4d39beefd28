//! Transaction orchestration
//!
//! Wraps one contract call with lifecycle notifications and a global
//! single-flight gate. There is no timeout and no retry: a call that never
//! settles keeps the gate closed.

use crate::classify::{classify, MSG_UNEXPECTED};
use crate::error::OrchestrationError;
use crate::failure::{Failure, FailureCategory};
use crate::notify::{NotificationId, Notifier};
use crate::session::Session;
use alloy::network::{Ethereum, ReceiptResponse};
use alloy::primitives::B256;
use alloy::providers::PendingTransactionBuilder;
use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};

pub const MSG_PROCESSING: &str = "Processing transaction...";
pub const MSG_NOT_CONNECTED: &str = "Wallet not connected";

/// Confirmed inclusion of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// A submitted transaction that can be awaited until inclusion
#[async_trait]
pub trait PendingCall: Send + Sized {
    /// Wait for one confirmation
    async fn confirm(self) -> Result<Confirmation, Failure>;
}

#[async_trait]
impl PendingCall for PendingTransactionBuilder<Ethereum> {
    async fn confirm(self) -> Result<Confirmation, Failure> {
        let tx_hash = *self.tx_hash();
        let receipt = self.with_required_confirmations(1).get_receipt().await?;
        if !receipt.status() {
            return Err(Failure::reverted(tx_hash));
        }
        Ok(Confirmation {
            tx_hash,
            block_number: receipt.block_number(),
        })
    }
}

/// At most one transaction in flight
#[derive(Debug, Default)]
pub struct PendingFlag(AtomicBool);

impl PendingFlag {
    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Close the gate, or `None` if it is already closed
    pub fn try_acquire(&self) -> Option<PendingGuard<'_>> {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| PendingGuard(&self.0))
    }
}

/// Reopens the gate when dropped, including on early return and unwind
pub struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Loading notification that must end in success or failure.
///
/// If the submission unwinds or its future is dropped before a terminal
/// notification, the slot is failed on drop so it never stays loading.
struct LoadingSlot<'a> {
    notifier: &'a Notifier,
    id: NotificationId,
    error_prefix: &'a str,
    settled: bool,
}

impl<'a> LoadingSlot<'a> {
    fn open(notifier: &'a Notifier, error_prefix: &'a str) -> Self {
        let id = NotificationId::unique();
        notifier.loading(&id, MSG_PROCESSING);
        Self {
            notifier,
            id,
            error_prefix,
            settled: false,
        }
    }

    fn success(mut self, message: &str) {
        self.settled = true;
        self.notifier.success(&self.id, message);
    }

    fn error(mut self, message: String) {
        self.settled = true;
        self.notifier.error(&self.id, message);
    }
}

impl Drop for LoadingSlot<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let message = format!("{}: {}", self.error_prefix, MSG_UNEXPECTED);
            self.notifier.error(&self.id, message);
        }
    }
}

/// Serialises contract calls and reports their lifecycle
#[derive(Debug)]
pub struct Orchestrator {
    pending: PendingFlag,
    notifier: Notifier,
}

impl Orchestrator {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            pending: PendingFlag::default(),
            notifier,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_pending()
    }

    /// Run `operation` against the session and wait for inclusion.
    ///
    /// Returns `Ok(false)` without doing anything when there is no session.
    pub async fn submit<F, Fut, P>(
        &self,
        session: Option<Session>,
        operation: F,
        success_message: &str,
        error_prefix: &str,
    ) -> Result<bool, OrchestrationError>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<P, Failure>>,
        P: PendingCall,
    {
        let Some(session) = session else {
            self.notifier.error_once(MSG_NOT_CONNECTED);
            return Ok(false);
        };

        let Some(_guard) = self.pending.try_acquire() else {
            return Err(OrchestrationError::AlreadyPending);
        };

        let slot = LoadingSlot::open(&self.notifier, error_prefix);

        let outcome = match operation(session).await {
            Ok(pending) => pending.confirm().await,
            Err(failure) => Err(failure),
        };

        match outcome {
            Ok(confirmation) => {
                info!(
                    tx_hash = %confirmation.tx_hash,
                    block = ?confirmation.block_number,
                    "Transaction confirmed"
                );
                slot.success(success_message);
                Ok(true)
            }
            Err(failure) => {
                let message = classify(&failure);
                error!(failure = %failure, classified = %message, "{}", error_prefix);
                slot.error(format!("{}: {}", error_prefix, message));
                Err(match failure.category() {
                    FailureCategory::Rejected => OrchestrationError::SubmissionRejected(message),
                    FailureCategory::Reverted => OrchestrationError::ChainReverted(message),
                    FailureCategory::Network => OrchestrationError::NetworkFault(message),
                    FailureCategory::Other => OrchestrationError::TransactionFailed(message),
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::contract;
    use crate::failure::codes;
    use crate::notify::{Level, Notification};
    use alloy::primitives::Address;
    use alloy::providers::{Provider, ProviderBuilder};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::sync::{broadcast, oneshot};

    /// Pending call that settles with a preset outcome
    pub struct MockPending(pub Result<Confirmation, Failure>);

    #[async_trait]
    impl PendingCall for MockPending {
        async fn confirm(self) -> Result<Confirmation, Failure> {
            self.0
        }
    }

    pub fn confirmed() -> MockPending {
        MockPending(Ok(Confirmation {
            tx_hash: B256::repeat_byte(7),
            block_number: Some(1),
        }))
    }

    pub fn test_session() -> Session {
        let provider = ProviderBuilder::new()
            .connect_http("http://127.0.0.1:8545".parse().unwrap())
            .erased();
        let account = Address::repeat_byte(1);
        Session::new(
            account,
            31337,
            contract::bind(Address::repeat_byte(0xaa), provider),
        )
    }

    fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }

    #[tokio::test]
    async fn test_success_emits_pending_then_success() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let orchestrator = Orchestrator::new(notifier);

        let result = orchestrator
            .submit(
                Some(test_session()),
                |_| async { Ok(confirmed()) },
                "ok",
                "failed",
            )
            .await;
        assert_eq!(result, Ok(true));
        assert!(!orchestrator.is_pending());

        let notes = drain(&mut rx);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].level, Level::Loading);
        assert_eq!(notes[1].level, Level::Success);
        assert_eq!(notes[1].message, "ok");
        assert_eq!(notes[0].id, notes[1].id);
    }

    #[tokio::test]
    async fn test_insufficient_funds_failure() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let orchestrator = Orchestrator::new(notifier);

        let result = orchestrator
            .submit(
                Some(test_session()),
                |_| async {
                    Err::<MockPending, _>(
                        Failure::new().with_symbolic_code(codes::INSUFFICIENT_FUNDS),
                    )
                },
                "ok",
                "failed",
            )
            .await;

        assert_eq!(
            result,
            Err(OrchestrationError::TransactionFailed(
                "Insufficient funds for transaction.".to_string()
            ))
        );
        assert!(!orchestrator.is_pending());

        let notes = drain(&mut rx);
        let last = notes.last().unwrap();
        assert_eq!(last.level, Level::Error);
        assert_eq!(last.message, "failed: Insufficient funds for transaction.");
    }

    #[tokio::test]
    async fn test_failure_categories_pick_variant() {
        let orchestrator = Orchestrator::new(Notifier::new());

        let rejected = orchestrator
            .submit(
                Some(test_session()),
                |_| async { Err::<MockPending, _>(Failure::message("denied").with_code(4001)) },
                "ok",
                "failed",
            )
            .await;
        assert_eq!(
            rejected,
            Err(OrchestrationError::SubmissionRejected(
                "Transaction rejected by user".to_string()
            ))
        );

        let reverted = orchestrator
            .submit(
                Some(test_session()),
                |_| async { Ok(MockPending(Err(Failure::reverted(B256::ZERO)))) },
                "ok",
                "failed",
            )
            .await;
        assert!(matches!(reverted, Err(OrchestrationError::ChainReverted(_))));

        let network = orchestrator
            .submit(
                Some(test_session()),
                |_| async {
                    Err::<MockPending, _>(
                        Failure::message("connection refused")
                            .with_symbolic_code(codes::NETWORK_ERROR),
                    )
                },
                "ok",
                "failed",
            )
            .await;
        assert_eq!(
            network,
            Err(OrchestrationError::NetworkFault(
                "Network error. Please check your connection".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_not_connected_is_a_notified_noop() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let orchestrator = Orchestrator::new(notifier);
        let calls = AtomicUsize::new(0);

        let result = orchestrator
            .submit(
                None,
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(confirmed()) }
                },
                "ok",
                "failed",
            )
            .await;

        assert_eq!(result, Ok(false));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let notes = drain(&mut rx);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, MSG_NOT_CONNECTED);
        assert!(!orchestrator.is_pending());
    }

    #[tokio::test]
    async fn test_second_submit_while_pending_is_refused() {
        let orchestrator = Arc::new(Orchestrator::new(Notifier::new()));
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (started_tx, started_rx) = oneshot::channel::<()>();

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .submit(
                        Some(test_session()),
                        |_| async move {
                            let _ = started_tx.send(());
                            let _ = release_rx.await;
                            Ok(confirmed())
                        },
                        "ok",
                        "failed",
                    )
                    .await
            })
        };

        started_rx.await.unwrap();
        assert!(orchestrator.is_pending());

        let second_calls = AtomicUsize::new(0);
        let second = orchestrator
            .submit(
                Some(test_session()),
                |_| {
                    second_calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(confirmed()) }
                },
                "ok",
                "failed",
            )
            .await;
        assert_eq!(second, Err(OrchestrationError::AlreadyPending));
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);

        release_tx.send(()).unwrap();
        assert_eq!(first.await.unwrap(), Ok(true));
        assert!(!orchestrator.is_pending());
    }

    #[tokio::test]
    async fn test_flag_released_when_operation_panics() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let orchestrator = Arc::new(Orchestrator::new(notifier));

        let task = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .submit(
                        Some(test_session()),
                        |_| -> std::future::Ready<Result<MockPending, Failure>> {
                            panic!("operation blew up")
                        },
                        "ok",
                        "failed",
                    )
                    .await
            })
        };

        assert!(task.await.is_err());
        assert!(!orchestrator.is_pending());

        let notes = drain(&mut rx);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].level, Level::Loading);
        assert_eq!(notes[1].id, notes[0].id);
        assert_eq!(notes[1].level, Level::Error);
        assert_eq!(notes[1].message, "failed: An unexpected error occurred");
    }

    #[tokio::test]
    async fn test_dropped_submission_settles_loading() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let orchestrator = Arc::new(Orchestrator::new(notifier));
        let (started_tx, started_rx) = oneshot::channel::<()>();

        let task = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .submit(
                        Some(test_session()),
                        |_| async move {
                            let _ = started_tx.send(());
                            std::future::pending::<Result<MockPending, Failure>>().await
                        },
                        "ok",
                        "failed",
                    )
                    .await
            })
        };

        started_rx.await.unwrap();
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(!orchestrator.is_pending());

        let notes = drain(&mut rx);
        let last = notes.last().unwrap();
        assert_eq!(last.id, notes[0].id);
        assert_eq!(last.level, Level::Error);
        assert_eq!(last.message, "failed: An unexpected error occurred");
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let flag = PendingFlag::default();
        {
            let _guard = flag.try_acquire().unwrap();
            assert!(flag.is_pending());
            assert!(flag.try_acquire().is_none());
        }
        assert!(!flag.is_pending());
    }
}
