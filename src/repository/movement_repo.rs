//! Movement repository
//!
//! sqlx access to the `movements` ledger. Inserts and the two in-place
//! deposit mutations run inside the caller's transaction so they commit or
//! roll back together with the account balance write.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{Movement, MovementStatus, MovementType};

type MovementRow = (
    Uuid,
    DateTime<Utc>,
    Decimal,
    String,
    String,
    Decimal,
    Option<Uuid>,
    Option<Uuid>,
    String,
);

fn row_to_movement(row: MovementRow) -> Result<Movement, sqlx::Error> {
    let (
        id,
        created_at,
        amount,
        movement_type,
        description,
        balance_after,
        origin_account_id,
        destination_account_id,
        status,
    ) = row;

    let movement_type = MovementType::parse(&movement_type).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown movement type: {movement_type}").into())
    })?;
    let status = MovementStatus::parse(&status)
        .ok_or_else(|| sqlx::Error::Decode(format!("unknown movement status: {status}").into()))?;

    Ok(Movement {
        id,
        created_at,
        amount,
        movement_type,
        description,
        balance_after,
        origin_account_id,
        destination_account_id,
        status,
    })
}

const SELECT_MOVEMENT: &str = r#"
    SELECT id, created_at, amount, movement_type, description, balance_after,
           origin_account_id, destination_account_id, status
    FROM movements
"#;

/// One account with its movement count, for the top-accounts query
#[derive(Debug, Clone)]
pub struct AccountActivity {
    pub account_id: Uuid,
    pub total_movements: i64,
}

/// Repository for ledger entries
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: PgPool,
}

impl MovementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a movement inside the caller's transaction
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        movement: &Movement,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO movements (
                id, created_at, amount, movement_type, description,
                balance_after, origin_account_id, destination_account_id, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(movement.id)
        .bind(movement.created_at)
        .bind(movement.amount)
        .bind(movement.movement_type.as_str())
        .bind(&movement.description)
        .bind(movement.balance_after)
        .bind(movement.origin_account_id)
        .bind(movement.destination_account_id)
        .bind(movement.status.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Find a movement by id
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Movement>, sqlx::Error> {
        let row: Option<MovementRow> = sqlx::query_as(&format!("{SELECT_MOVEMENT} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_movement).transpose()
    }

    /// Rewrite amount + balance_after of a corrected deposit.
    /// id, type and created_at stay untouched.
    pub async fn update_amount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        new_amount: Decimal,
        new_balance_after: Decimal,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE movements SET amount = $1, balance_after = $2 WHERE id = $3")
            .bind(new_amount)
            .bind(new_balance_after)
            .bind(id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Flip a deposit to its terminal REVERTED status
    pub async fn mark_reverted(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        new_balance_after: Decimal,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE movements SET status = 'REVERTED', balance_after = $1 WHERE id = $2")
            .bind(new_balance_after)
            .bind(id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Paginated history of one account (origin or destination), newest first
    pub async fn find_by_account(
        &self,
        account_id: Uuid,
        limit: i64,
        from: i64,
    ) -> Result<(i64, Vec<Movement>), sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM movements WHERE origin_account_id = $1 OR destination_account_id = $1",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;

        let rows: Vec<MovementRow> = sqlx::query_as(&format!(
            r#"
            {SELECT_MOVEMENT}
            WHERE origin_account_id = $1 OR destination_account_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(account_id)
        .bind(limit)
        .bind(from)
        .fetch_all(&self.pool)
        .await?;

        let movements = rows
            .into_iter()
            .map(row_to_movement)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((total, movements))
    }

    /// Most recent movements of one account
    pub async fn recent_for_account(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Movement>, sqlx::Error> {
        let rows: Vec<MovementRow> = sqlx::query_as(&format!(
            r#"
            {SELECT_MOVEMENT}
            WHERE origin_account_id = $1 OR destination_account_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_movement).collect()
    }

    /// Top accounts by movement count, origin and destination occurrences
    /// combined
    pub async fn top_accounts(&self, limit: i64) -> Result<Vec<AccountActivity>, sqlx::Error> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            r#"
            SELECT account_id, COUNT(*) AS total_movements
            FROM (
                SELECT origin_account_id AS account_id FROM movements
                WHERE origin_account_id IS NOT NULL
                UNION ALL
                SELECT destination_account_id FROM movements
                WHERE destination_account_id IS NOT NULL
            ) sides
            GROUP BY account_id
            ORDER BY total_movements DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(account_id, total_movements)| AccountActivity {
                account_id,
                total_movements,
            })
            .collect())
    }

    /// Sum of TRANSFER_OUT amounts from one origin account inside a time
    /// window. Feeds the rolling daily cap.
    ///
    /// Deliberately filters on TRANSFER_OUT: that is the type actually
    /// recorded for outgoing transfers.
    pub async fn transfer_out_total(
        &self,
        origin_account_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Decimal, sqlx::Error> {
        let total: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT SUM(amount) FROM movements
            WHERE origin_account_id = $1
              AND movement_type = 'TRANSFER_OUT'
              AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(origin_account_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(Decimal::ZERO))
    }
}
