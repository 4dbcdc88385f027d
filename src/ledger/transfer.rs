//! Transfer Handler
//!
//! Moves money between two accounts under the limit policy. The origin
//! debit, destination credit and both ledger rows commit in a single
//! database transaction; a failure anywhere rolls the whole operation back.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    local_day_bounds, Amount, DomainError, LimitPolicy, Movement, MovementStatus, MovementType,
    Principal,
};
use crate::error::AppError;
use crate::repository::{AccountRepository, MovementRepository};

use super::{conflict_backoff, is_version_conflict, TransferCommand, TransferResult, MAX_RETRIES};

/// Handler for client transfers
pub struct TransferHandler {
    accounts: AccountRepository,
    movements: MovementRepository,
    policy: LimitPolicy,
    pool: PgPool,
}

impl TransferHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            accounts: AccountRepository::new(pool.clone()),
            movements: MovementRepository::new(pool.clone()),
            policy: LimitPolicy,
            pool,
        }
    }

    /// Execute the transfer command on behalf of `principal`
    pub async fn execute(
        &self,
        command: TransferCommand,
        principal: &Principal,
    ) -> Result<TransferResult, AppError> {
        if command.origin_account == command.destination_account {
            return Err(DomainError::SameAccountTransfer.into());
        }

        let amount: Amount = command
            .amount
            .parse()
            .map_err(|e: crate::domain::AmountError| DomainError::InvalidAmount(e.to_string()))?;

        for attempt in 0..MAX_RETRIES {
            match self.try_execute(&command, &amount, principal).await {
                Err(e) if is_version_conflict(&e) && attempt < MAX_RETRIES - 1 => {
                    // A concurrent writer touched one of the accounts; reload
                    // everything (including the daily total) and try again.
                    tracing::warn!(
                        origin = %command.origin_account,
                        "Version conflict on transfer, retrying (attempt {}/{})",
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
        command: &TransferCommand,
        amount: &Amount,
        principal: &Principal,
    ) -> Result<TransferResult, AppError> {
        let origin = self
            .accounts
            .find_by_number(&command.origin_account)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(command.origin_account.clone()))?;
        origin.ensure_active()?;
        principal.ensure_can_operate_on(origin.id)?;

        let destination = self
            .accounts
            .find_by_number(&command.destination_account)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(command.destination_account.clone()))?;
        destination.ensure_active()?;

        // Limit policy runs before any mutation; a rejection leaves no state
        let (day_start, day_end) = local_day_bounds(Utc::now());
        let transferred_today = self
            .movements
            .transfer_out_total(origin.id, day_start, day_end)
            .await?;
        self.policy.check(amount, transferred_today)?;

        let origin_balance = origin.debit(amount)?;
        let destination_balance = destination.credit(amount)?;

        let now = Utc::now();
        let withdrawal = Movement {
            id: Uuid::new_v4(),
            created_at: now,
            amount: amount.value(),
            movement_type: MovementType::TransferOut,
            description: command.description.clone(),
            balance_after: origin_balance.value(),
            origin_account_id: Some(origin.id),
            destination_account_id: Some(destination.id),
            status: MovementStatus::Completed,
        };
        let deposit = Movement {
            id: Uuid::new_v4(),
            created_at: now,
            amount: amount.value(),
            movement_type: MovementType::TransferIn,
            description: command.description.clone(),
            balance_after: destination_balance.value(),
            origin_account_id: Some(origin.id),
            destination_account_id: Some(destination.id),
            status: MovementStatus::Completed,
        };

        let mut tx = self.pool.begin().await?;

        // Write accounts in ascending id order so concurrent reverse-direction
        // transfers cannot deadlock on row locks.
        let mut writes = [
            (origin.id, &origin_balance, origin.version),
            (destination.id, &destination_balance, destination.version),
        ];
        writes.sort_by_key(|(id, _, _)| *id);
        for (account_id, balance, version) in writes {
            self.accounts
                .update_balance(&mut tx, account_id, balance, version)
                .await?;
        }

        self.movements.insert(&mut tx, &withdrawal).await?;
        self.movements.insert(&mut tx, &deposit).await?;
        tx.commit().await?;

        tracing::info!(
            withdrawal_id = %withdrawal.id,
            deposit_id = %deposit.id,
            origin = %origin.number,
            destination = %destination.number,
            amount = %amount,
            "Transfer completed"
        );

        Ok(TransferResult {
            withdrawal,
            deposit,
            new_balance_origin: origin_balance.value(),
            new_balance_destination: destination_balance.value(),
        })
    }
}
