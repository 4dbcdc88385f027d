//! Ledger read queries
//!
//! Pure reads over the movement ledger: paginated history, recent activity
//! of an owned account, and the busiest accounts. No invariants beyond
//! input validation and the ownership check on recent activity.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Account, DomainError, Movement, Principal};
use crate::error::AppError;
use crate::repository::{AccountRepository, MovementRepository};

/// Page size cap for history queries
const MAX_PAGE_SIZE: i64 = 100;

/// How many movements "recent" means
const RECENT_LIMIT: i64 = 5;

/// How many accounts the top-accounts board shows
const TOP_ACCOUNTS_LIMIT: i64 = 5;

/// One entry of the top-accounts board
#[derive(Debug, Clone, Serialize)]
pub struct TopAccount {
    pub account_id: Uuid,
    pub account_number: String,
    pub balance: Decimal,
    pub owner_id: Uuid,
    pub total_movements: i64,
}

/// Read-only queries over accounts and movements
pub struct LedgerQueries {
    accounts: AccountRepository,
    movements: MovementRepository,
}

impl LedgerQueries {
    pub fn new(pool: PgPool) -> Self {
        Self {
            accounts: AccountRepository::new(pool.clone()),
            movements: MovementRepository::new(pool),
        }
    }

    /// Paginated movement history of an account, newest first
    pub async fn account_history(
        &self,
        account_id: Uuid,
        limit: i64,
        from: i64,
    ) -> Result<(i64, Vec<Movement>), AppError> {
        let account = self.require_account(account_id).await?;
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let from = from.max(0);

        let page = self.movements.find_by_account(account.id, limit, from).await?;
        Ok(page)
    }

    /// Most recent movements of an account the caller owns
    pub async fn recent_movements(
        &self,
        principal: &Principal,
        account_id: Uuid,
    ) -> Result<Vec<Movement>, AppError> {
        principal.ensure_can_operate_on(account_id)?;
        let account = self.require_account(account_id).await?;

        let movements = self
            .movements
            .recent_for_account(account.id, RECENT_LIMIT)
            .await?;
        Ok(movements)
    }

    /// Busiest accounts by movement count (origin and destination combined)
    pub async fn top_accounts(&self) -> Result<Vec<TopAccount>, AppError> {
        let activity = self.movements.top_accounts(TOP_ACCOUNTS_LIMIT).await?;

        let mut board = Vec::with_capacity(activity.len());
        for entry in activity {
            // Skip entries whose account vanished rather than failing the board
            if let Some(account) = self.accounts.find_by_id(entry.account_id).await? {
                board.push(TopAccount {
                    account_id: account.id,
                    account_number: account.number,
                    balance: account.balance.value(),
                    owner_id: account.owner_id,
                    total_movements: entry.total_movements,
                });
            }
        }

        Ok(board)
    }

    async fn require_account(&self, account_id: Uuid) -> Result<Account, AppError> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| DomainError::AccountNotFound(account_id.to_string()).into())
    }
}
