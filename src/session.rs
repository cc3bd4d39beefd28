//! Connected wallet session

use crate::contract::ContractHandle;
use alloy::primitives::Address;
use std::fmt;

/// A live wallet connection with a bound contract handle
///
/// `connected_address` is what the wallet currently reports. `signer_address`
/// is the account the contract handle was bound to; the two differ after an
/// account switch when rebinding is disabled.
#[derive(Clone)]
pub struct Session {
    pub connected_address: Address,
    pub signer_address: Address,
    pub chain_id: u64,
    pub contract: ContractHandle,
}

impl Session {
    pub fn new(account: Address, chain_id: u64, contract: ContractHandle) -> Self {
        Self {
            connected_address: account,
            signer_address: account,
            chain_id,
            contract,
        }
    }

    pub fn contract_address(&self) -> Address {
        *self.contract.address()
    }

    /// True when calls would be signed by an account other than the displayed one
    pub fn is_signer_stale(&self) -> bool {
        self.connected_address != self.signer_address
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connected_address", &self.connected_address)
            .field("signer_address", &self.signer_address)
            .field("chain_id", &self.chain_id)
            .field("contract", &self.contract.address())
            .finish()
    }
}
