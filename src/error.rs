//! Error types for the joint account client

use thiserror::Error;

/// Failures while establishing a wallet session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("No wallet provider configured. Set WALLET_RPC_URL or PRIVATE_KEY")]
    NoWalletInstalled,

    #[error("Wallet connection rejected by user")]
    UserRejected,

    #[error("Invalid contract address configuration: {0}")]
    InvalidConfiguration(String),

    #[error("{0}")]
    Provider(String),
}

/// Failures surfaced by the transaction orchestrator
///
/// The message-carrying variants display as the bare classified message so a
/// form can show it verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("Wallet not connected")]
    NotConnected,

    #[error("Another transaction is already pending")]
    AlreadyPending,

    #[error("{0}")]
    SubmissionRejected(String),

    #[error("{0}")]
    ChainReverted(String),

    #[error("{0}")]
    NetworkFault(String),

    #[error("{0}")]
    TransactionFailed(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Transaction error: {0}")]
    Orchestration(#[from] OrchestrationError),

    #[error("{0}")]
    Form(#[from] crate::forms::FormError),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Simulation failed: {0}")]
    Simulation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
