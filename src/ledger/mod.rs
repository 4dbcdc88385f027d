//! Ledger module
//!
//! The transaction orchestrator: deposit, withdrawal, transfer and the two
//! deposit corrections, plus the read-only queries over the movement ledger.
//!
//! Every mutation runs inside a single database transaction. Account writes
//! carry an optimistic version check; on conflict the whole operation is
//! retried against fresh state, so two concurrent writers against one
//! account can never both apply from the same pre-mutation balance.

mod commands;
mod correction;
mod deposit;
mod queries;
mod transfer;
mod withdrawal;

pub use commands::{
    CorrectDepositCommand, DepositCommand, MovementResult, RevertDepositCommand, TransferCommand,
    TransferResult, WithdrawalCommand,
};
pub use correction::CorrectionHandler;
pub use deposit::DepositHandler;
pub use queries::{LedgerQueries, TopAccount};
pub use transfer::TransferHandler;
pub use withdrawal::WithdrawalHandler;

use crate::domain::DomainError;
use crate::error::AppError;

/// Attempts per operation before surfacing the version conflict
pub(crate) const MAX_RETRIES: u32 = 3;

pub(crate) fn is_version_conflict(err: &AppError) -> bool {
    matches!(err, AppError::Domain(DomainError::VersionConflict { .. }))
}

/// Exponential backoff between conflict retries
pub(crate) async fn conflict_backoff(attempt: u32) {
    let delay = std::time::Duration::from_millis(50 * (u64::from(attempt) + 1));
    tokio::time::sleep(delay).await;
}
