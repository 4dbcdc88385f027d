//! Command definitions
//!
//! Commands represent intentions to move money; results carry the created
//! movement(s) and the resulting balance(s).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Movement;

/// Command to deposit into an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositCommand {
    /// Externally visible number of the destination account
    pub destination_account: String,
    /// Amount as string for precise decimal parsing
    pub amount: String,
    pub description: String,
}

impl DepositCommand {
    pub fn new(destination_account: String, amount: String) -> Self {
        Self {
            destination_account,
            amount,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }
}

/// Command to withdraw from an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalCommand {
    pub account_number: String,
    pub amount: String,
    pub description: String,
}

impl WithdrawalCommand {
    pub fn new(account_number: String, amount: String) -> Self {
        Self {
            account_number,
            amount,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }
}

/// Command to transfer between two accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCommand {
    pub origin_account: String,
    pub destination_account: String,
    pub amount: String,
    pub description: String,
}

impl TransferCommand {
    pub fn new(origin_account: String, destination_account: String, amount: String) -> Self {
        Self {
            origin_account,
            destination_account,
            amount,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }
}

/// Command to correct the amount of a recent deposit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectDepositCommand {
    pub movement_id: Uuid,
    pub new_amount: String,
}

/// Command to revert a recent deposit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevertDepositCommand {
    pub movement_id: Uuid,
}

/// Result of a deposit, withdrawal, correction or reversal
#[derive(Debug, Clone, Serialize)]
pub struct MovementResult {
    pub movement: Movement,
    pub new_balance: Decimal,
}

/// Result of a successful transfer: both linked movements, both balances
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub withdrawal: Movement,
    pub deposit: Movement,
    pub new_balance_origin: Decimal,
    pub new_balance_destination: Decimal,
}
