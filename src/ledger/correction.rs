//! Correction Handler
//!
//! The two time-boxed deposit mutations: correct a deposit's amount, or
//! revert it entirely. Both only apply to DEPOSIT movements that are not
//! yet REVERTED and still inside the one-hour edit window; both rewrite the
//! movement and the account balance in one database transaction.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::domain::{
    round_money, Amount, Balance, DomainError, Movement, MovementStatus,
};
use crate::error::AppError;
use crate::repository::{AccountRepository, MovementRepository};

use super::{
    conflict_backoff, is_version_conflict, CorrectDepositCommand, MovementResult,
    RevertDepositCommand, MAX_RETRIES,
};

/// Handler for deposit corrections and reversals
pub struct CorrectionHandler {
    accounts: AccountRepository,
    movements: MovementRepository,
    pool: PgPool,
}

impl CorrectionHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            accounts: AccountRepository::new(pool.clone()),
            movements: MovementRepository::new(pool.clone()),
            pool,
        }
    }

    /// Replace the amount of a recent deposit.
    ///
    /// Removes the old amount's effect from the balance, applies the new
    /// one, and rewrites `amount` + `balance_after` in place. Id, type and
    /// creation date never change.
    pub async fn correct(&self, command: CorrectDepositCommand) -> Result<MovementResult, AppError> {
        let new_amount: Amount = command
            .new_amount
            .parse()
            .map_err(|e: crate::domain::AmountError| DomainError::InvalidAmount(e.to_string()))?;

        for attempt in 0..MAX_RETRIES {
            match self.try_correct(&command, &new_amount).await {
                Err(e) if is_version_conflict(&e) && attempt < MAX_RETRIES - 1 => {
                    conflict_backoff(attempt).await;
                }
                other => return other,
            }
        }

        unreachable!("retry loop always returns on the last attempt")
    }

    /// Roll back a recent deposit.
    ///
    /// Subtracts the amount from the balance and parks the movement in its
    /// terminal REVERTED status. The row stays in the ledger as an audit
    /// record.
    pub async fn revert(&self, command: RevertDepositCommand) -> Result<MovementResult, AppError> {
        for attempt in 0..MAX_RETRIES {
            match self.try_revert(&command).await {
                Err(e) if is_version_conflict(&e) && attempt < MAX_RETRIES - 1 => {
                    conflict_backoff(attempt).await;
                }
                other => return other,
            }
        }

        unreachable!("retry loop always returns on the last attempt")
    }

    async fn try_correct(
        &self,
        command: &CorrectDepositCommand,
        new_amount: &Amount,
    ) -> Result<MovementResult, AppError> {
        let (mut movement, account_id, balance, version) =
            self.load_editable(command.movement_id).await?;

        let new_balance =
            rebalance(balance, movement.amount, new_amount.value()).ok_or_else(|| {
                DomainError::insufficient_funds(movement.amount - new_amount.value(), balance)
            })?;

        let mut tx = self.pool.begin().await?;
        self.accounts
            .update_balance(&mut tx, account_id, &new_balance, version)
            .await?;
        self.movements
            .update_amount(&mut tx, movement.id, new_amount.value(), new_balance.value())
            .await?;
        tx.commit().await?;

        movement.amount = new_amount.value();
        movement.balance_after = new_balance.value();

        tracing::info!(
            movement_id = %movement.id,
            new_amount = %new_amount,
            "Deposit amount corrected"
        );

        Ok(MovementResult {
            movement,
            new_balance: new_balance.value(),
        })
    }

    async fn try_revert(&self, command: &RevertDepositCommand) -> Result<MovementResult, AppError> {
        let (mut movement, account_id, balance, version) =
            self.load_editable(command.movement_id).await?;

        let new_balance = rebalance(balance, movement.amount, Decimal::ZERO)
            .ok_or_else(|| DomainError::insufficient_funds(movement.amount, balance))?;

        let mut tx = self.pool.begin().await?;
        self.accounts
            .update_balance(&mut tx, account_id, &new_balance, version)
            .await?;
        self.movements
            .mark_reverted(&mut tx, movement.id, new_balance.value())
            .await?;
        tx.commit().await?;

        movement.status = MovementStatus::Reverted;
        movement.balance_after = new_balance.value();

        tracing::info!(movement_id = %movement.id, "Deposit reverted");

        Ok(MovementResult {
            movement,
            new_balance: new_balance.value(),
        })
    }

    /// Load the movement and its destination account, running every edit
    /// gate (type, status, window, account active).
    async fn load_editable(
        &self,
        movement_id: uuid::Uuid,
    ) -> Result<(Movement, uuid::Uuid, Decimal, i64), AppError> {
        let movement = self
            .movements
            .find_by_id(movement_id)
            .await?
            .ok_or(DomainError::MovementNotFound(movement_id))?;

        movement.ensure_editable(Utc::now())?;

        let account_id = movement
            .destination_account_id
            .ok_or_else(|| AppError::Internal("deposit movement without destination".to_string()))?;

        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()))?;
        account.ensure_active()?;

        Ok((movement, account.id, account.balance.value(), account.version))
    }
}

/// Remove `old_amount`'s effect and apply `new_amount`, at ledger precision.
/// None when the account no longer holds enough to take the difference back.
fn rebalance(balance: Decimal, old_amount: Decimal, new_amount: Decimal) -> Option<Balance> {
    let raw = round_money(balance - old_amount + new_amount);
    Balance::new(raw).ok()
}
