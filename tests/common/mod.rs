//! Common test utilities

use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use banca_api::domain::generate_account_number;

/// Setup test database - truncate tables and seed a test API key
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    // Hash the key the same way the middleware does
    let hash_check = banca_api::api::middleware::hash_api_key("test_key_123");

    let mut tx = pool.begin().await.expect("Failed to begin transaction");

    // Clean up DB for fresh state
    sqlx::query("TRUNCATE TABLE movements, accounts, users, api_keys CASCADE")
        .execute(&mut *tx)
        .await
        .expect("Failed to clean up DB");

    // Seed test API Key with dynamically computed hash
    sqlx::query(
        r#"
        INSERT INTO api_keys (id, name, key_hash, key_prefix, permissions, is_active)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (key_prefix) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("Test Key")
    .bind(&hash_check)
    .bind("test_")
    .bind(vec!["admin".to_string()])
    .bind(true)
    .execute(&mut *tx)
    .await
    .expect("Failed to seed API key");

    tx.commit().await.expect("Failed to commit transaction");

    pool
}

/// Insert a user and return its id
pub async fn seed_user(pool: &PgPool, username: &str, role: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, username, role, is_active) VALUES ($1, $2, $3, TRUE)")
        .bind(id)
        .bind(username)
        .bind(role)
        .execute(pool)
        .await
        .expect("Failed to seed user");
    id
}

/// Insert an active MONETARY account and return (id, number)
pub async fn seed_account(pool: &PgPool, owner_id: Uuid, balance: Decimal) -> (Uuid, String) {
    let id = Uuid::new_v4();
    let number = generate_account_number();
    sqlx::query(
        r#"
        INSERT INTO accounts (id, number, account_type, balance, is_active, owner_id, version)
        VALUES ($1, $2, 'MONETARY', $3, TRUE, $4, 1)
        "#,
    )
    .bind(id)
    .bind(&number)
    .bind(balance)
    .bind(owner_id)
    .execute(pool)
    .await
    .expect("Failed to seed account");
    (id, number)
}

/// Current balance of an account, straight from the table
pub async fn account_balance(pool: &PgPool, account_id: Uuid) -> Decimal {
    sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read balance")
}

/// Number of ledger rows touching an account, on either side
pub async fn movement_count(pool: &PgPool, account_id: Uuid) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM movements WHERE origin_account_id = $1 OR destination_account_id = $1",
    )
    .bind(account_id)
    .fetch_one(pool)
    .await
    .expect("Failed to count movements")
}
