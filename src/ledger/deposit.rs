//! Deposit Handler
//!
//! Credits an account and appends the matching DEPOSIT movement in one
//! database transaction.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Amount, DomainError, Movement, MovementStatus, MovementType};
use crate::error::AppError;
use crate::repository::{AccountRepository, MovementRepository};

use super::{conflict_backoff, is_version_conflict, DepositCommand, MovementResult, MAX_RETRIES};

/// Handler for deposits
pub struct DepositHandler {
    accounts: AccountRepository,
    movements: MovementRepository,
    pool: PgPool,
}

impl DepositHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            accounts: AccountRepository::new(pool.clone()),
            movements: MovementRepository::new(pool.clone()),
            pool,
        }
    }

    /// Execute the deposit command
    pub async fn execute(&self, command: DepositCommand) -> Result<MovementResult, AppError> {
        let amount: Amount = command
            .amount
            .parse()
            .map_err(|e: crate::domain::AmountError| DomainError::InvalidAmount(e.to_string()))?;

        for attempt in 0..MAX_RETRIES {
            match self.try_execute(&command, &amount).await {
                Err(e) if is_version_conflict(&e) && attempt < MAX_RETRIES - 1 => {
                    tracing::warn!(
                        account = %command.destination_account,
                        "Version conflict on deposit, retrying (attempt {}/{})",
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
        command: &DepositCommand,
        amount: &Amount,
    ) -> Result<MovementResult, AppError> {
        let account = self
            .accounts
            .find_by_number(&command.destination_account)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(command.destination_account.clone()))?;

        let new_balance = account.credit(amount)?;

        let movement = Movement {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            amount: amount.value(),
            movement_type: MovementType::Deposit,
            description: command.description.clone(),
            balance_after: new_balance.value(),
            origin_account_id: None,
            destination_account_id: Some(account.id),
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
            "Deposit completed"
        );

        Ok(MovementResult {
            movement,
            new_balance: new_balance.value(),
        })
    }
}
