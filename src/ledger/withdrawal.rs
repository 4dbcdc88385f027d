//! Withdrawal Handler
//!
//! Debits an account and appends the matching WITHDRAWAL movement in one
//! database transaction. Overdrafts are rejected before any write.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Amount, DomainError, Movement, MovementStatus, MovementType};
use crate::error::AppError;
use crate::repository::{AccountRepository, MovementRepository};

use super::{conflict_backoff, is_version_conflict, MovementResult, WithdrawalCommand, MAX_RETRIES};

/// Handler for withdrawals
pub struct WithdrawalHandler {
    accounts: AccountRepository,
    movements: MovementRepository,
    pool: PgPool,
}

impl WithdrawalHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            accounts: AccountRepository::new(pool.clone()),
            movements: MovementRepository::new(pool.clone()),
            pool,
        }
    }

    /// Execute the withdrawal command
    pub async fn execute(&self, command: WithdrawalCommand) -> Result<MovementResult, AppError> {
        let amount: Amount = command
            .amount
            .parse()
            .map_err(|e: crate::domain::AmountError| DomainError::InvalidAmount(e.to_string()))?;

        for attempt in 0..MAX_RETRIES {
            match self.try_execute(&command, &amount).await {
                Err(e) if is_version_conflict(&e) && attempt < MAX_RETRIES - 1 => {
                    tracing::warn!(
                        account = %command.account_number,
                        "Version conflict on withdrawal, retrying (attempt {}/{})",
                        attempt + 1,
                        MAX_RETRIES
                    );
                    conflict_backoff(attempt).await;
                }
                other => return other,
            }
        }

        unreachable!("retry loop always returns on the last attempt")
    }

    async fn try_execute(
        &self,
        command: &WithdrawalCommand,
        amount: &Amount,
    ) -> Result<MovementResult, AppError> {
        let account = self
            .accounts
            .find_by_number(&command.account_number)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(command.account_number.clone()))?;

        // Rejects inactive accounts and overdrafts before anything is written
        let new_balance = account.debit(amount)?;

        let movement = Movement {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            amount: amount.value(),
            movement_type: MovementType::Withdrawal,
            description: command.description.clone(),
            balance_after: new_balance.value(),
            origin_account_id: Some(account.id),
            destination_account_id: None,
            status: MovementStatus::Completed,
        };

        let mut tx = self.pool.begin().await?;
        self.accounts
            .update_balance(&mut tx, account.id, &new_balance, account.version)
            .await?;
        self.movements.insert(&mut tx, &movement).await?;
        tx.commit().await?;

        tracing::info!(
            movement_id = %movement.id,
            account = %account.number,
            amount = %amount,
            "Withdrawal completed"
        );

        Ok(MovementResult {
            movement,
            new_balance: new_balance.value(),
        })
    }
}
