//! Failure values handed to the classifier
//!
//! Every boundary that can fail (wallet RPC, contract encoding, submission,
//! receipt polling) is converted into a [`Failure`] so that a single
//! precedence-ordered classifier can turn it into a user-facing string.

use alloy::contract::Error as ContractError;
use alloy::primitives::utils::UnitsError;
use alloy::primitives::B256;
use alloy::providers::PendingTransactionError;
use alloy::sol_types::{decode_revert_reason, Revert, SolError};
use alloy::transports::TransportError;
use serde_json::{json, Value};
use std::fmt;

/// Wallet code for "user declined the request" (EIP-1193)
pub const USER_REJECTED_CODE: i64 = 4001;

/// Symbolic failure codes
pub mod codes {
    pub const INSUFFICIENT_FUNDS: &str = "INSUFFICIENT_FUNDS";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const CALL_EXCEPTION: &str = "CALL_EXCEPTION";
    pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
}

/// Error code attached to a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCode {
    Numeric(i64),
    Symbolic(String),
}

impl FailureCode {
    pub fn is_numeric(&self, code: i64) -> bool {
        matches!(self, FailureCode::Numeric(c) if *c == code)
    }

    pub fn is_symbolic(&self, code: &str) -> bool {
        matches!(self, FailureCode::Symbolic(c) if c == code)
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCode::Numeric(c) => write!(f, "{}", c),
            FailureCode::Symbolic(c) => f.write_str(c),
        }
    }
}

/// Coarse grouping used to pick an orchestration error variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Rejected,
    Reverted,
    Network,
    Other,
}

/// An arbitrary failure from any stage of a contract interaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Failure {
    /// Set when a transaction response itself was raised as the failure
    pub transaction_response: bool,
    pub code: Option<FailureCode>,
    pub message: Option<String>,
    /// Auxiliary payload, usually RPC error data
    pub data: Option<Value>,
}

impl Failure {
    pub fn new() -> Self {
        Self::default()
    }

    /// A failure carrying only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self::default().with_message(message)
    }

    /// A transaction response surfaced as an error (misused call result)
    pub fn transaction_response() -> Self {
        Self {
            transaction_response: true,
            ..Self::default()
        }
    }

    /// Input that could not be encoded into a contract call
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::message(message).with_symbolic_code(codes::INVALID_ARGUMENT)
    }

    /// A mined transaction whose receipt reports failure
    pub fn reverted(tx_hash: B256) -> Self {
        Self::message(format!("transaction execution reverted ({})", tx_hash))
            .with_symbolic_code(codes::CALL_EXCEPTION)
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(FailureCode::Numeric(code));
        self
    }

    pub fn with_symbolic_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(FailureCode::Symbolic(code.into()));
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    fn message_contains(&self, needle: &str) -> bool {
        self.message.as_deref().is_some_and(|m| m.contains(needle))
    }

    pub fn category(&self) -> FailureCategory {
        let code = self.code.as_ref();
        if code.is_some_and(|c| c.is_numeric(USER_REJECTED_CODE))
            || self.message_contains("user rejected")
        {
            FailureCategory::Rejected
        } else if code.is_some_and(|c| c.is_symbolic(codes::NETWORK_ERROR)) {
            FailureCategory::Network
        } else if self.transaction_response
            || code.is_some_and(|c| c.is_symbolic(codes::CALL_EXCEPTION))
            || self.message_contains("revert")
        {
            FailureCategory::Reverted
        } else {
            FailureCategory::Other
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{} (code {})", message, code),
            (None, Some(message)) => f.write_str(message),
            (Some(code), None) => write!(f, "code {}", code),
            (None, None) => f.write_str("unknown failure"),
        }
    }
}

impl From<TransportError> for Failure {
    fn from(err: TransportError) -> Self {
        if let Some(payload) = err.as_error_resp() {
            let mut failure = Failure::message(payload.message.to_string()).with_code(payload.code);

            // Prefer a decoded Solidity revert reason over raw hex data
            if let Some(reason) = payload
                .as_revert_data()
                .and_then(|bytes| revert_message(&bytes))
            {
                failure.data = Some(json!({ "message": reason }));
            } else if let Some(raw) = payload.data.as_ref() {
                failure.data = serde_json::from_str(raw.get()).ok();
            }

            if payload.message.contains("insufficient funds") {
                failure = failure.with_symbolic_code(codes::INSUFFICIENT_FUNDS);
            }
            return failure;
        }

        if err.is_transport_error() {
            return Failure::message(err.to_string()).with_symbolic_code(codes::NETWORK_ERROR);
        }

        Failure::message(err.to_string())
    }
}

/// Bare `Error(string)` reason; other payloads use alloy's rendering
fn revert_message(data: &[u8]) -> Option<String> {
    match Revert::abi_decode(data) {
        Ok(revert) => Some(revert.reason),
        Err(_) => decode_revert_reason(data),
    }
}

impl From<ContractError> for Failure {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::TransportError(e) => e.into(),
            ContractError::PendingTransactionError(e) => e.into(),
            other => Failure::invalid_argument(other.to_string()),
        }
    }
}

impl From<PendingTransactionError> for Failure {
    fn from(err: PendingTransactionError) -> Self {
        match err {
            PendingTransactionError::TransportError(e) => e.into(),
            other => Failure::message(other.to_string()).with_symbolic_code(codes::NETWORK_ERROR),
        }
    }
}

impl From<UnitsError> for Failure {
    fn from(err: UnitsError) -> Self {
        Failure::invalid_argument(format!("invalid decimal value: {}", err))
    }
}
