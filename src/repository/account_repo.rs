//! Account repository
//!
//! sqlx access to the `accounts` table. Balance writes go through
//! `update_balance`, which enforces the optimistic version check inside the
//! caller's transaction.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{Account, AccountType, Balance, DomainError};
use crate::error::AppError;

type AccountRow = (Uuid, String, String, Decimal, bool, Uuid, i64);

fn row_to_account(row: AccountRow) -> Result<Account, sqlx::Error> {
    let (id, number, account_type, balance, is_active, owner_id, version) = row;

    let account_type = AccountType::parse(&account_type)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown account type: {account_type}").into()))?;
    let balance = Balance::new(balance)
        .map_err(|e| sqlx::Error::Decode(format!("invalid stored balance: {e}").into()))?;

    Ok(Account {
        id,
        number,
        account_type,
        balance,
        is_active,
        owner_id,
        version,
    })
}

const SELECT_ACCOUNT: &str = r#"
    SELECT id, number, account_type, balance, is_active, owner_id, version
    FROM accounts
"#;

/// Repository for account records
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an account by its externally visible number
    pub async fn find_by_number(&self, number: &str) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> =
            sqlx::query_as(&format!("{SELECT_ACCOUNT} WHERE number = $1"))
                .bind(number)
                .fetch_optional(&self.pool)
                .await?;

        row.map(row_to_account).transpose()
    }

    /// Find an account by id
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> = sqlx::query_as(&format!("{SELECT_ACCOUNT} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_account).transpose()
    }

    /// All account ids owned by a user (for the caller principal)
    pub async fn find_ids_by_owner(&self, owner_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM accounts WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
    }

    /// All accounts owned by a user
    pub async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<Account>, sqlx::Error> {
        let rows: Vec<AccountRow> = sqlx::query_as(&format!(
            "{SELECT_ACCOUNT} WHERE owner_id = $1 ORDER BY created_at"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_account).collect()
    }

    /// All accounts, newest first
    pub async fn list_all(&self) -> Result<Vec<Account>, sqlx::Error> {
        let rows: Vec<AccountRow> =
            sqlx::query_as(&format!("{SELECT_ACCOUNT} ORDER BY created_at DESC"))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(row_to_account).collect()
    }

    /// Insert a freshly opened account
    pub async fn insert(&self, account: &Account) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, number, account_type, balance, is_active, owner_id, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(account.id)
        .bind(&account.number)
        .bind(account.account_type.as_str())
        .bind(account.balance.value())
        .bind(account.is_active)
        .bind(account.owner_id)
        .bind(account.version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Soft-close an account; the record is never deleted
    pub async fn soft_close(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE accounts SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Compare-and-swap balance write inside the caller's transaction.
    ///
    /// The version observed at load time must still be current; zero rows
    /// updated means another writer got there first and the whole operation
    /// should be retried against fresh state.
    pub async fn update_balance(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
        new_balance: &Balance,
        expected_version: i64,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = $1, version = version + 1
            WHERE id = $2 AND version = $3
            "#,
        )
        .bind(new_balance.value())
        .bind(account_id)
        .bind(expected_version)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(DomainError::VersionConflict {
                account_id,
                expected: expected_version,
            }
            .into())
        }
    }
}
