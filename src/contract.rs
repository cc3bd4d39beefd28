//! Joint account contract binding
//!
//! The interface is fixed. Events are declared for completeness and for log
//! decoding but are not consumed by the client.

use crate::failure::Failure;
use alloy::network::Ethereum;
use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder};
use alloy::sol;
use alloy::sol_types::SolCall;
use serde::Serialize;

sol! {
    #[sol(rpc)]
    contract JointAccount {
        event AccountClosed(uint256 user1, uint256 user2);
        event AccountCreated(uint256 user1, uint256 user2, uint256 initialBalance);
        event AmountSent(uint256 from, uint256 to, uint256 amount);
        event UserRegistered(uint256 userId, string name);

        function registerUser(uint256 userId, string name) external;
        function createAccount(uint256 user1, uint256 user2) external payable;
        function sendAmount(uint256 from, uint256 to, uint256 amount) external;
        function closeAccount(uint256 user1, uint256 user2) external;
    }
}

/// Contract handle bound to a signing provider
pub type ContractHandle = JointAccount::JointAccountInstance<DynProvider>;

/// Bind the contract at `address` to a provider
pub fn bind(address: Address, provider: DynProvider) -> ContractHandle {
    JointAccount::new(address, provider)
}

/// A single contract invocation: method, ordered arguments, optional value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum ContractCall {
    RegisterUser {
        user_id: U256,
        name: String,
    },
    CreateAccount {
        user1: U256,
        user2: U256,
        initial_balance: U256,
    },
    SendAmount {
        from: U256,
        to: U256,
        amount: U256,
    },
    CloseAccount {
        user1: U256,
        user2: U256,
    },
}

impl ContractCall {
    pub fn register_user(user_id: &str, name: &str) -> Result<Self, Failure> {
        Ok(Self::RegisterUser {
            user_id: parse_user_id(user_id)?,
            name: name.to_string(),
        })
    }

    /// `initial_balance` is a decimal ether amount, e.g. "1.5"
    pub fn create_account(user1: &str, user2: &str, initial_balance: &str) -> Result<Self, Failure> {
        Ok(Self::CreateAccount {
            user1: parse_user_id(user1)?,
            user2: parse_user_id(user2)?,
            initial_balance: parse_amount(initial_balance)?,
        })
    }

    /// `amount` is a decimal ether amount
    pub fn send_amount(from: &str, to: &str, amount: &str) -> Result<Self, Failure> {
        Ok(Self::SendAmount {
            from: parse_user_id(from)?,
            to: parse_user_id(to)?,
            amount: parse_amount(amount)?,
        })
    }

    pub fn close_account(user1: &str, user2: &str) -> Result<Self, Failure> {
        Ok(Self::CloseAccount {
            user1: parse_user_id(user1)?,
            user2: parse_user_id(user2)?,
        })
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            Self::RegisterUser { .. } => "registerUser",
            Self::CreateAccount { .. } => "createAccount",
            Self::SendAmount { .. } => "sendAmount",
            Self::CloseAccount { .. } => "closeAccount",
        }
    }

    /// Value attached to the transaction, only `createAccount` is payable
    pub fn value(&self) -> Option<U256> {
        match self {
            Self::CreateAccount {
                initial_balance, ..
            } => Some(*initial_balance),
            _ => None,
        }
    }

    /// ABI-encoded calldata including the selector
    pub fn calldata(&self) -> Bytes {
        let encoded = match self {
            Self::RegisterUser { user_id, name } => JointAccount::registerUserCall {
                userId: *user_id,
                name: name.clone(),
            }
            .abi_encode(),
            Self::CreateAccount { user1, user2, .. } => JointAccount::createAccountCall {
                user1: *user1,
                user2: *user2,
            }
            .abi_encode(),
            Self::SendAmount { from, to, amount } => JointAccount::sendAmountCall {
                from: *from,
                to: *to,
                amount: *amount,
            }
            .abi_encode(),
            Self::CloseAccount { user1, user2 } => JointAccount::closeAccountCall {
                user1: *user1,
                user2: *user2,
            }
            .abi_encode(),
        };
        Bytes::from(encoded)
    }

    /// Submit the call from `from`, returning once the provider accepts it
    pub async fn send(
        &self,
        contract: &ContractHandle,
        from: Address,
    ) -> Result<PendingTransactionBuilder<Ethereum>, Failure> {
        tracing::debug!(
            method = self.method_name(),
            from = %from,
            contract = %contract.address(),
            "Submitting contract call"
        );

        let pending = match self {
            Self::RegisterUser { user_id, name } => {
                contract
                    .registerUser(*user_id, name.clone())
                    .from(from)
                    .send()
                    .await?
            }
            Self::CreateAccount {
                user1,
                user2,
                initial_balance,
            } => {
                contract
                    .createAccount(*user1, *user2)
                    .from(from)
                    .value(*initial_balance)
                    .send()
                    .await?
            }
            Self::SendAmount { from: src, to, amount } => {
                contract
                    .sendAmount(*src, *to, *amount)
                    .from(from)
                    .send()
                    .await?
            }
            Self::CloseAccount { user1, user2 } => {
                contract
                    .closeAccount(*user1, *user2)
                    .from(from)
                    .send()
                    .await?
            }
        };

        Ok(pending)
    }
}

/// Parse a decimal ether amount into wei. The contract takes unsigned
/// values only, so a sign is refused rather than wrapped.
pub fn parse_amount(input: &str) -> Result<U256, Failure> {
    let trimmed = input.trim();
    if trimmed.starts_with('-') {
        return Err(Failure::invalid_argument(format!(
            "invalid decimal value: negative amount {:?}",
            trimmed
        )));
    }
    Ok(parse_ether(trimmed)?)
}

/// Parse a user id from text input. Range and existence are left to the contract.
pub fn parse_user_id(input: &str) -> Result<U256, Failure> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Failure::invalid_argument("invalid user id: empty value"));
    }
    U256::from_str_radix(trimmed, 10)
        .map_err(|e| Failure::invalid_argument(format!("invalid user id {:?}: {}", trimmed, e)))
}
