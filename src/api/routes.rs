//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{generate_account_number, Account, AccountType, Balance, Movement};
use crate::error::AppError;
use crate::ledger::{
    CorrectDepositCommand, CorrectionHandler, DepositCommand, DepositHandler, LedgerQueries,
    RevertDepositCommand, TopAccount, TransferCommand, TransferHandler, WithdrawalCommand,
    WithdrawalHandler,
};
use crate::repository::AccountRepository;

use super::middleware::{resolve_principal, AuthenticatedApiKey, RequestUser};

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub destination_account: String,
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    pub account_number: String,
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub destination_account: String,
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CorrectDepositRequest {
    pub new_amount: String,
}

#[derive(Debug, Serialize)]
pub struct MovementResponse {
    pub msg: String,
    pub movement: Movement,
    pub new_balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub msg: String,
    pub withdrawal: Movement,
    pub deposit: Movement,
    pub new_balance_origin: Decimal,
    pub new_balance_destination: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct OpenAccountRequest {
    pub owner_id: Uuid,
    pub account_type: AccountType,
    #[serde(default)]
    pub opening_balance: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub account: Account,
}

#[derive(Debug, Serialize)]
pub struct AccountsListResponse {
    pub accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub from: i64,
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub total: i64,
    pub movements: Vec<Movement>,
}

#[derive(Debug, Serialize)]
pub struct TopAccountsResponse {
    pub top_accounts: Vec<TopAccount>,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<PgPool> {
    Router::new()
        // Money movements (back-office)
        .route("/movements/deposit", post(make_deposit))
        .route("/movements/withdrawal", post(make_withdrawal))
        // Client-initiated transfer from an owned account
        .route("/movements/transfer/:origin_account", post(make_transfer))
        // Time-boxed deposit mutations
        .route("/movements/:movement_id/amount", patch(correct_deposit))
        .route("/movements/:movement_id/revert", post(revert_deposit))
        // Ledger reads
        .route("/movements/top-accounts", get(top_accounts))
        .route("/accounts/:account_id/movements", get(account_history))
        .route(
            "/accounts/:account_id/movements/recent",
            get(recent_movements),
        )
        // Account management
        .route("/accounts", post(open_account).get(list_accounts))
        .route("/accounts/:account_id", get(get_account).delete(close_account))
        .route("/users/:user_id/accounts", get(list_accounts_by_owner))
}

fn require_permission(api_key: &AuthenticatedApiKey, permission: &str) -> Result<(), AppError> {
    if api_key.has_permission(permission) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("{permission} permission required")))
    }
}

// =========================================================================
// POST /movements/deposit
// =========================================================================

/// Deposit into an account (back-office only)
async fn make_deposit(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Json(request): Json<DepositRequest>,
) -> Result<(StatusCode, Json<MovementResponse>), AppError> {
    require_permission(&api_key, "movements")?;

    let command = DepositCommand::new(request.destination_account, request.amount)
        .with_description(request.description.unwrap_or_default());

    let result = DepositHandler::new(pool).execute(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(MovementResponse {
            msg: "Deposit completed successfully".to_string(),
            movement: result.movement,
            new_balance: result.new_balance,
        }),
    ))
}

// =========================================================================
// POST /movements/withdrawal
// =========================================================================

/// Withdraw from an account (back-office only)
async fn make_withdrawal(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Json(request): Json<WithdrawalRequest>,
) -> Result<(StatusCode, Json<MovementResponse>), AppError> {
    require_permission(&api_key, "movements")?;

    let command = WithdrawalCommand::new(request.account_number, request.amount)
        .with_description(request.description.unwrap_or_default());

    let result = WithdrawalHandler::new(pool).execute(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(MovementResponse {
            msg: "Withdrawal completed successfully".to_string(),
            movement: result.movement,
            new_balance: result.new_balance,
        }),
    ))
}

// =========================================================================
// POST /movements/transfer/:origin_account
// =========================================================================

/// Transfer from an owned account to any active account
async fn make_transfer(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    request_user: Option<Extension<RequestUser>>,
    Path(origin_account): Path<String>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransferResponse>), AppError> {
    require_permission(&api_key, "transfer")?;

    // The acting client must be identified for the ownership check
    let request_user =
        request_user.ok_or_else(|| AppError::MissingHeader("X-Request-User-Id".to_string()))?;
    let principal = resolve_principal(&pool, request_user.user_id).await?;

    let command = TransferCommand::new(origin_account, request.destination_account, request.amount)
        .with_description(request.description.unwrap_or_default());

    let result = TransferHandler::new(pool).execute(command, &principal).await?;

    Ok((
        StatusCode::CREATED,
        Json(TransferResponse {
            msg: "Transfer completed successfully".to_string(),
            withdrawal: result.withdrawal,
            deposit: result.deposit,
            new_balance_origin: result.new_balance_origin,
            new_balance_destination: result.new_balance_destination,
        }),
    ))
}

// =========================================================================
// PATCH /movements/:movement_id/amount
// =========================================================================

/// Correct the amount of a recent deposit
async fn correct_deposit(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Path(movement_id): Path<Uuid>,
    Json(request): Json<CorrectDepositRequest>,
) -> Result<Json<MovementResponse>, AppError> {
    require_permission(&api_key, "movements")?;

    let command = CorrectDepositCommand {
        movement_id,
        new_amount: request.new_amount,
    };

    let result = CorrectionHandler::new(pool).correct(command).await?;

    Ok(Json(MovementResponse {
        msg: "Deposit amount updated successfully".to_string(),
        movement: result.movement,
        new_balance: result.new_balance,
    }))
}

// =========================================================================
// POST /movements/:movement_id/revert
// =========================================================================

/// Revert a recent deposit
async fn revert_deposit(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Path(movement_id): Path<Uuid>,
) -> Result<Json<MovementResponse>, AppError> {
    require_permission(&api_key, "movements")?;

    let command = RevertDepositCommand { movement_id };
    let result = CorrectionHandler::new(pool).revert(command).await?;

    Ok(Json(MovementResponse {
        msg: "Deposit reverted successfully".to_string(),
        movement: result.movement,
        new_balance: result.new_balance,
    }))
}

// =========================================================================
// GET /accounts/:account_id/movements
// =========================================================================

/// Paginated movement history of an account
async fn account_history(
    State(pool): State<PgPool>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let (total, movements) = LedgerQueries::new(pool)
        .account_history(account_id, query.limit, query.from)
        .await?;

    Ok(Json(HistoryResponse { total, movements }))
}

// =========================================================================
// GET /accounts/:account_id/movements/recent
// =========================================================================

/// Most recent movements of an account the caller owns
async fn recent_movements(
    State(pool): State<PgPool>,
    request_user: Option<Extension<RequestUser>>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, AppError> {
    let request_user =
        request_user.ok_or_else(|| AppError::MissingHeader("X-Request-User-Id".to_string()))?;
    let principal = resolve_principal(&pool, request_user.user_id).await?;

    let movements = LedgerQueries::new(pool)
        .recent_movements(&principal, account_id)
        .await?;

    Ok(Json(HistoryResponse {
        total: movements.len() as i64,
        movements,
    }))
}

// =========================================================================
// GET /movements/top-accounts
// =========================================================================

/// Busiest accounts by movement count
async fn top_accounts(State(pool): State<PgPool>) -> Result<Json<TopAccountsResponse>, AppError> {
    let top_accounts = LedgerQueries::new(pool).top_accounts().await?;
    Ok(Json(TopAccountsResponse { top_accounts }))
}

// =========================================================================
// POST /accounts
// =========================================================================

/// Open a new account for an existing user (back-office only)
async fn open_account(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Json(request): Json<OpenAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    require_permission(&api_key, "accounts")?;

    let owner: Option<bool> = sqlx::query_scalar("SELECT is_active FROM users WHERE id = $1")
        .bind(request.owner_id)
        .fetch_optional(&pool)
        .await?;

    match owner {
        None => return Err(AppError::UserNotFound(request.owner_id.to_string())),
        Some(false) => return Err(AppError::Forbidden("Owner is inactive".to_string())),
        Some(true) => {}
    }

    let opening_balance = request.opening_balance.unwrap_or_default();
    if opening_balance.normalize().scale() > 2 {
        return Err(AppError::InvalidRequest(
            "Opening balance has more than 2 decimal places".to_string(),
        ));
    }
    let balance = Balance::new(opening_balance)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid opening balance: {e}")))?;

    let account = Account {
        id: Uuid::new_v4(),
        number: generate_account_number(),
        account_type: request.account_type,
        balance,
        is_active: true,
        owner_id: request.owner_id,
        version: 1,
    };

    AccountRepository::new(pool).insert(&account).await?;

    tracing::info!(account_id = %account.id, number = %account.number, "Account opened");

    Ok((StatusCode::CREATED, Json(AccountResponse { account })))
}

// =========================================================================
// GET /accounts
// =========================================================================

/// List all accounts (back-office only)
async fn list_accounts(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
) -> Result<Json<AccountsListResponse>, AppError> {
    require_permission(&api_key, "accounts")?;

    let accounts = AccountRepository::new(pool).list_all().await?;
    Ok(Json(AccountsListResponse { accounts }))
}

// =========================================================================
// GET /accounts/:account_id
// =========================================================================

/// Get one account by id
async fn get_account(
    State(pool): State<PgPool>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = AccountRepository::new(pool)
        .find_by_id(account_id)
        .await?
        .ok_or_else(|| crate::domain::DomainError::AccountNotFound(account_id.to_string()))?;

    Ok(Json(AccountResponse { account }))
}

// =========================================================================
// DELETE /accounts/:account_id
// =========================================================================

/// Soft-close an account; the record and its ledger history remain
async fn close_account(
    State(pool): State<PgPool>,
    Extension(api_key): Extension<AuthenticatedApiKey>,
    Path(account_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    require_permission(&api_key, "accounts")?;

    let closed = AccountRepository::new(pool).soft_close(account_id).await?;
    if !closed {
        return Err(crate::domain::DomainError::AccountNotFound(account_id.to_string()).into());
    }

    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// GET /users/:user_id/accounts
// =========================================================================

/// List accounts owned by a user
async fn list_accounts_by_owner(
    State(pool): State<PgPool>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AccountsListResponse>, AppError> {
    let exists: Option<bool> = sqlx::query_scalar("SELECT is_active FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;

    if exists.is_none() {
        return Err(AppError::UserNotFound(user_id.to_string()));
    }

    let accounts = AccountRepository::new(pool).list_by_owner(user_id).await?;
    Ok(Json(AccountsListResponse { accounts }))
}
