//! Form surfaces
//!
//! Each form holds the raw text of its inputs and submits through the
//! application callbacks. On success the fields are cleared; on failure they
//! are kept so the user can correct them. Amounts are passed on as decimal
//! strings and only converted to wei when the call is built.

use crate::app::AppContext;
use crate::contract::ContractCall;
use crate::error::OrchestrationError;
use crate::failure::Failure;
use crate::notify::NotificationId;
use crate::orchestrator::MSG_NOT_CONNECTED;
use async_trait::async_trait;
use thiserror::Error;

/// Why a form submission did not go through
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("Wallet not connected")]
    NotConnected,

    #[error("Another transaction is already pending")]
    Busy,

    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait FormSurface: Send {
    /// Stable notification id, reused for loading/success/failure
    const ID: &'static str;
    const TITLE: &'static str;
    const LOADING: &'static str;
    const SUCCESS: &'static str;
    /// Shown when the failure carries no message
    const FAILURE: &'static str;

    /// Input labels, in entry order
    fn labels(&self) -> &'static [&'static str];

    /// Input values, same order as [`FormSurface::labels`]
    fn values_mut(&mut self) -> Vec<&mut String>;

    fn values(&self) -> Vec<&str>;

    /// The contract call the current inputs describe
    fn call(&self) -> Result<ContractCall, Failure>;

    /// Call the bound application callback
    async fn invoke(&self, app: &AppContext) -> Result<bool, OrchestrationError>;

    fn clear(&mut self) {
        for value in self.values_mut() {
            value.clear();
        }
    }

    async fn submit(&mut self, app: &AppContext) -> Result<(), FormError> {
        if app.is_processing() {
            return Err(FormError::Busy);
        }

        let id = NotificationId::new(Self::ID);
        let notifier = app.notifier().clone();
        notifier.loading(&id, Self::LOADING);

        match self.invoke(app).await {
            Ok(true) => {
                notifier.success(&id, Self::SUCCESS);
                self.clear();
                Ok(())
            }
            Ok(false) => {
                notifier.error(&id, MSG_NOT_CONNECTED);
                Err(FormError::NotConnected)
            }
            Err(OrchestrationError::AlreadyPending) => {
                notifier.error(&id, OrchestrationError::AlreadyPending.to_string());
                Err(FormError::Busy)
            }
            Err(e) => {
                tracing::error!(form = Self::ID, error = %e, "{}", Self::FAILURE);
                let mut message = e.to_string();
                if message.is_empty() {
                    message = Self::FAILURE.to_string();
                }
                notifier.error(&id, message.clone());
                Err(FormError::Failed(message))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterUserForm {
    pub user_id: String,
    pub name: String,
}

impl RegisterUserForm {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
        }
    }
}

#[async_trait]
impl FormSurface for RegisterUserForm {
    const ID: &'static str = "register";
    const TITLE: &'static str = "Register User";
    const LOADING: &'static str = "Registering user...";
    const SUCCESS: &'static str = "User registered successfully!";
    const FAILURE: &'static str = "Registration failed";

    fn labels(&self) -> &'static [&'static str] {
        &["User ID", "User Name"]
    }

    fn values_mut(&mut self) -> Vec<&mut String> {
        vec![&mut self.user_id, &mut self.name]
    }

    fn values(&self) -> Vec<&str> {
        vec![&self.user_id, &self.name]
    }

    fn call(&self) -> Result<ContractCall, Failure> {
        ContractCall::register_user(&self.user_id, &self.name)
    }

    async fn invoke(&self, app: &AppContext) -> Result<bool, OrchestrationError> {
        app.register_user(&self.user_id, &self.name).await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenAccountForm {
    pub user1: String,
    pub user2: String,
    /// Decimal ether amount
    pub balance: String,
}

impl OpenAccountForm {
    pub fn new(
        user1: impl Into<String>,
        user2: impl Into<String>,
        balance: impl Into<String>,
    ) -> Self {
        Self {
            user1: user1.into(),
            user2: user2.into(),
            balance: balance.into(),
        }
    }
}

#[async_trait]
impl FormSurface for OpenAccountForm {
    const ID: &'static str = "create";
    const TITLE: &'static str = "Create Joint Account";
    const LOADING: &'static str = "Creating joint account...";
    const SUCCESS: &'static str = "Joint account created successfully!";
    const FAILURE: &'static str = "Account creation failed";

    fn labels(&self) -> &'static [&'static str] {
        &["User 1 ID", "User 2 ID", "Initial Balance (ETH)"]
    }

    fn values_mut(&mut self) -> Vec<&mut String> {
        vec![&mut self.user1, &mut self.user2, &mut self.balance]
    }

    fn values(&self) -> Vec<&str> {
        vec![&self.user1, &self.user2, &self.balance]
    }

    fn call(&self) -> Result<ContractCall, Failure> {
        ContractCall::create_account(&self.user1, &self.user2, &self.balance)
    }

    async fn invoke(&self, app: &AppContext) -> Result<bool, OrchestrationError> {
        app.create_account(&self.user1, &self.user2, &self.balance)
            .await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferForm {
    pub from: String,
    pub to: String,
    /// Decimal ether amount
    pub amount: String,
}

impl TransferForm {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount: amount.into(),
        }
    }
}

#[async_trait]
impl FormSurface for TransferForm {
    const ID: &'static str = "transfer";
    const TITLE: &'static str = "Transfer Amount";
    const LOADING: &'static str = "Processing transfer...";
    const SUCCESS: &'static str = "Transfer completed successfully!";
    const FAILURE: &'static str = "Transfer failed";

    fn labels(&self) -> &'static [&'static str] {
        &["From User ID", "To User ID", "Amount (ETH)"]
    }

    fn values_mut(&mut self) -> Vec<&mut String> {
        vec![&mut self.from, &mut self.to, &mut self.amount]
    }

    fn values(&self) -> Vec<&str> {
        vec![&self.from, &self.to, &self.amount]
    }

    fn call(&self) -> Result<ContractCall, Failure> {
        ContractCall::send_amount(&self.from, &self.to, &self.amount)
    }

    async fn invoke(&self, app: &AppContext) -> Result<bool, OrchestrationError> {
        app.send_amount(&self.from, &self.to, &self.amount).await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseAccountForm {
    pub user1: String,
    pub user2: String,
}

impl CloseAccountForm {
    pub fn new(user1: impl Into<String>, user2: impl Into<String>) -> Self {
        Self {
            user1: user1.into(),
            user2: user2.into(),
        }
    }
}

#[async_trait]
impl FormSurface for CloseAccountForm {
    const ID: &'static str = "close";
    const TITLE: &'static str = "Close Joint Account";
    const LOADING: &'static str = "Closing account...";
    const SUCCESS: &'static str = "Account closed successfully!";
    const FAILURE: &'static str = "Account closure failed";

    fn labels(&self) -> &'static [&'static str] {
        &["User 1 ID", "User 2 ID"]
    }

    fn values_mut(&mut self) -> Vec<&mut String> {
        vec![&mut self.user1, &mut self.user2]
    }

    fn values(&self) -> Vec<&str> {
        vec![&self.user1, &self.user2]
    }

    fn call(&self) -> Result<ContractCall, Failure> {
        ContractCall::close_account(&self.user1, &self.user2)
    }

    async fn invoke(&self, app: &AppContext) -> Result<bool, OrchestrationError> {
        app.close_account(&self.user1, &self.user2).await
    }
}
