//! Transaction simulation before signing
//!
//! Runs a contract call through `eth_call` as the session's signer, so a
//! revert shows up before the wallet is asked to sign anything.
//!
//! This module is read-only: it never signs or submits transactions.

use crate::classify::classify;
use crate::contract::{ContractCall, ContractHandle};
use crate::failure::Failure;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use serde::Serialize;
use serde_json::Value;

/// Result of simulating a contract call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationResult {
    pub method: &'static str,
    pub success: bool,
    /// Estimated gas (if successful and the node could estimate it)
    pub gas_used: Option<u64>,
    /// Revert reason or classified failure (if failed)
    pub revert_reason: Option<String>,
    /// Raw return data from eth_call
    pub return_data: Option<Bytes>,
}

impl SimulationResult {
    fn success(method: &'static str, gas_used: Option<u64>, return_data: Bytes) -> Self {
        Self {
            method,
            success: true,
            gas_used,
            revert_reason: None,
            return_data: Some(return_data),
        }
    }

    fn failed(method: &'static str, reason: String) -> Self {
        Self {
            method,
            success: false,
            gas_used: None,
            revert_reason: Some(reason),
            return_data: None,
        }
    }
}

/// Simulates calls against a bound contract
pub struct TransactionSimulator<'a> {
    contract: &'a ContractHandle,
    from: Address,
}

impl<'a> TransactionSimulator<'a> {
    pub fn new(contract: &'a ContractHandle, from: Address) -> Self {
        Self { contract, from }
    }

    /// The request `call` would be sent as
    pub fn request_for(&self, call: &ContractCall) -> TransactionRequest {
        let request = TransactionRequest::default()
            .with_from(self.from)
            .with_to(*self.contract.address())
            .with_input(call.calldata());
        match call.value() {
            Some(value) => request.with_value(value),
            None => request,
        }
    }

    pub async fn simulate(&self, call: &ContractCall) -> SimulationResult {
        let provider = self.contract.provider();
        let tx = self.request_for(call);

        match provider.call(tx.clone()).await {
            Ok(output) => {
                let gas_used = provider.estimate_gas(tx).await.ok();
                tracing::debug!(method = call.method_name(), gas = ?gas_used, "Simulation succeeded");
                SimulationResult::success(call.method_name(), gas_used, output)
            }
            Err(e) => {
                let failure = Failure::from(e);
                let reason = revert_reason(&failure).unwrap_or_else(|| classify(&failure));
                tracing::debug!(method = call.method_name(), reason = %reason, "Simulation reverted");
                SimulationResult::failed(call.method_name(), reason)
            }
        }
    }
}

/// Decoded Solidity revert reason, if the node returned one
fn revert_reason(failure: &Failure) -> Option<String> {
    failure
        .data
        .as_ref()
        .and_then(|data| data.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
