//! User-facing error classification
//!
//! Maps any [`Failure`] to a short message. Rules are checked in order and
//! the first match wins: exact codes, then message substrings, then nested
//! revert data, then the failure's own message.

use crate::failure::{codes, Failure, USER_REJECTED_CODE};
use serde_json::Value;

pub const MSG_BAD_CALL: &str = "Transaction failed. Please check your inputs and try again.";
pub const MSG_REJECTED: &str = "Transaction rejected by user";
pub const MSG_INSUFFICIENT_FUNDS: &str = "Insufficient funds for transaction.";
pub const MSG_NETWORK: &str = "Network error. Please check your connection";
pub const MSG_TX_FAILED: &str = "Transaction failed";
pub const MSG_UNEXPECTED: &str = "An unexpected error occurred";

/// Classify a failure into a human-readable message. Never panics.
pub fn classify(failure: &Failure) -> String {
    if failure.transaction_response {
        return MSG_BAD_CALL.to_string();
    }

    if let Some(code) = &failure.code {
        if code.is_numeric(USER_REJECTED_CODE) {
            return MSG_REJECTED.to_string();
        }
        if code.is_symbolic(codes::INSUFFICIENT_FUNDS) {
            return MSG_INSUFFICIENT_FUNDS.to_string();
        }
        if code.is_symbolic(codes::NETWORK_ERROR) {
            return MSG_NETWORK.to_string();
        }
    }

    let message = failure.message.as_deref().unwrap_or_default();
    if message.contains("user rejected transaction") {
        return MSG_REJECTED.to_string();
    }
    if message.contains("insufficient funds") {
        return MSG_INSUFFICIENT_FUNDS.to_string();
    }

    if let Some(data) = &failure.data {
        if let Some(reason) = revert_reason(data) {
            return reason;
        }
    }

    if message.is_empty() {
        MSG_UNEXPECTED.to_string()
    } else {
        message.to_string()
    }
}

/// Read a nested `message` from error data.
///
/// Returns `None` when the data does not parse to a JSON object so the
/// caller falls through.
fn revert_reason(data: &Value) -> Option<String> {
    if let Some(message) = non_empty_message(data) {
        return Some(message);
    }

    let text = data.as_str()?;
    let parsed: Value = serde_json::from_str(text).ok()?;
    parsed.as_object()?;
    Some(non_empty_message(&parsed).unwrap_or_else(|| MSG_TX_FAILED.to_string()))
}

fn non_empty_message(value: &Value) -> Option<String> {
    value
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}
