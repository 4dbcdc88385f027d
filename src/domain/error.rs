//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Business rule violations and domain invariant failures.
///
/// Independent of the web/infrastructure layer; `AppError` translates these
/// into HTTP responses at the boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Insufficient funds for a debit operation
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    /// Account is soft-closed and cannot take part in movements
    #[error("Account is inactive")]
    AccountInactive,

    /// Invalid amount (zero, negative, too precise, or out of range)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Movement not found
    #[error("Movement not found: {0}")]
    MovementNotFound(Uuid),

    /// Transfer to same account
    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    /// Caller does not own the account they are operating on
    #[error("Not the owner of account {0}")]
    NotOwner(Uuid),

    /// Single transfer above the per-transaction cap
    #[error("Transfer amount {amount} exceeds the Q{limit} limit per transaction")]
    PerTransactionLimitExceeded { amount: Decimal, limit: Decimal },

    /// Cumulative transfers for the day would exceed the daily cap
    #[error("Daily transfer limit of Q{limit} exceeded (Q{spent_today} already transferred today)")]
    DailyLimitExceeded { spent_today: Decimal, limit: Decimal },

    /// Correction/reversal attempted on a non-DEPOSIT movement
    #[error("Only deposit movements can be corrected or reverted (movement is {actual})")]
    WrongMovementType { actual: String },

    /// Movement already carries the terminal REVERTED status
    #[error("Movement is already reverted")]
    AlreadyReverted,

    /// The one-hour edit window for the deposit has elapsed
    #[error("Time limit exceeded to correct or revert this deposit")]
    EditWindowExpired,

    /// Optimistic concurrency conflict on an account write
    #[error("Version conflict on account {account_id}: expected {expected}")]
    VersionConflict { account_id: Uuid, expected: i64 },
}

impl DomainError {
    /// Create an insufficient funds error
    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::VersionConflict { .. })
    }

    /// Check if this is a conflict error (retry may help)
    pub fn is_conflict_error(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}
