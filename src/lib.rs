//! Joint Account Client
//!
//! A wallet-backed client for the joint account smart contract:
//! - Connects to a wallet (external JSON-RPC wallet or a local key)
//! - Binds the contract and submits one transaction at a time
//! - Turns wallet, RPC and chain failures into short user-facing messages
//! - Exposes four form surfaces (register, open, transfer, close)
//!
//! # Security Model
//!
//! - Private keys never leave the wallet module
//! - Every write goes through the single-flight orchestrator
//! - Calls can be simulated with `eth_call` before signing

pub mod app;
pub mod classify;
pub mod config;
pub mod connection;
pub mod contract;
pub mod failure;
pub mod forms;
pub mod notify;
pub mod orchestrator;
pub mod session;
pub mod shell;
pub mod simulation;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use app::{App, AppContext, AppView};
pub use config::{Config, RpcConfig};
pub use connection::{ConnectionManager, ConnectionSettings, SessionEvent};
pub use error::{ConnectionError, Error, OrchestrationError, Result};
pub use failure::Failure;
pub use notify::{Notification, NotificationBoard, Notifier};
