//! API Integration Tests
//!
//! End-to-end tests against a real Postgres database. Run with:
//! `DATABASE_URL=... cargo test -- --ignored`

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    middleware, Router,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::util::ServiceExt;

use banca_api::api;

mod common;

fn test_app(pool: PgPool) -> Router {
    api::create_router()
        .layer(middleware::from_fn_with_state(
            pool.clone(),
            api::middleware::auth_middleware,
        ))
        .with_state(pool)
}

const API_KEY: &str = "test_key_123";

async fn json_body(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn balance_of(json: &Value, field: &str) -> Decimal {
    json[field]
        .as_str()
        .unwrap_or_else(|| panic!("{field} missing in {json}"))
        .parse()
        .unwrap()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_deposit_and_withdrawal_e2e() {
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "client_a", "CLIENT_ROLE").await;
    let (account_id, number) = common::seed_account(&pool, owner, dec!(0)).await;
    let app = test_app(pool.clone());

    // Deposit 1000.00
    let req = Request::builder()
        .method("POST")
        .uri("/movements/deposit")
        .header("content-type", "application/json")
        .header("X-API-Key", API_KEY)
        .body(Body::from(
            json!({ "destination_account": number, "amount": "1000.00" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED, "Deposit failed");
    let body = json_body(response).await;
    assert_eq!(balance_of(&body, "new_balance"), dec!(1000));
    assert_eq!(body["movement"]["movement_type"], "DEPOSIT");
    assert_eq!(body["movement"]["status"], "COMPLETED");

    // Withdraw 300.00
    let req = Request::builder()
        .method("POST")
        .uri("/movements/withdrawal")
        .header("content-type", "application/json")
        .header("X-API-Key", API_KEY)
        .body(Body::from(
            json!({ "account_number": number, "amount": "300.00" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED, "Withdrawal failed");
    let body = json_body(response).await;
    assert_eq!(balance_of(&body, "new_balance"), dec!(700));

    // Overdraft rejected, balance untouched
    let req = Request::builder()
        .method("POST")
        .uri("/movements/withdrawal")
        .header("content-type", "application/json")
        .header("X-API-Key", API_KEY)
        .body(Body::from(
            json!({ "account_number": number, "amount": "1000.00" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "insufficient_funds");
    assert_eq!(common::account_balance(&pool, account_id).await, dec!(700));

    // History shows the two committed movements, newest first
    let req = Request::builder()
        .method("GET")
        .uri(format!("/accounts/{account_id}/movements"))
        .header("X-API-Key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["movements"][0]["movement_type"], "WITHDRAWAL");
    assert_eq!(body["movements"][1]["movement_type"], "DEPOSIT");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_transfer_e2e() {
    let pool = common::setup_test_db().await;
    let sender = common::seed_user(&pool, "sender", "CLIENT_ROLE").await;
    let receiver = common::seed_user(&pool, "receiver", "CLIENT_ROLE").await;
    let (origin_id, origin) = common::seed_account(&pool, sender, dec!(1000)).await;
    let (destination_id, destination) = common::seed_account(&pool, receiver, dec!(50)).await;
    let app = test_app(pool.clone());

    let req = Request::builder()
        .method("POST")
        .uri(format!("/movements/transfer/{origin}"))
        .header("content-type", "application/json")
        .header("X-API-Key", API_KEY)
        .header("X-Request-User-Id", sender.to_string())
        .body(Body::from(
            json!({ "destination_account": destination, "amount": "300.00", "description": "Rent" })
                .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED, "Transfer failed");
    let body = json_body(response).await;
    assert_eq!(balance_of(&body, "new_balance_origin"), dec!(700));
    assert_eq!(balance_of(&body, "new_balance_destination"), dec!(350));
    assert_eq!(body["withdrawal"]["movement_type"], "TRANSFER_OUT");
    assert_eq!(body["deposit"]["movement_type"], "TRANSFER_IN");

    // Both rows landed, both balances persisted
    assert_eq!(common::account_balance(&pool, origin_id).await, dec!(700));
    assert_eq!(common::account_balance(&pool, destination_id).await, dec!(350));
    assert_eq!(common::movement_count(&pool, origin_id).await, 2);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_transfer_from_unowned_account_forbidden() {
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "owner", "CLIENT_ROLE").await;
    let intruder = common::seed_user(&pool, "intruder", "CLIENT_ROLE").await;
    let (origin_id, origin) = common::seed_account(&pool, owner, dec!(1000)).await;
    let (_, destination) = common::seed_account(&pool, intruder, dec!(0)).await;
    let app = test_app(pool.clone());

    let req = Request::builder()
        .method("POST")
        .uri(format!("/movements/transfer/{origin}"))
        .header("content-type", "application/json")
        .header("X-API-Key", API_KEY)
        .header("X-Request-User-Id", intruder.to_string())
        .body(Body::from(
            json!({ "destination_account": destination, "amount": "10.00" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "not_owner");

    // Nothing moved
    assert_eq!(common::account_balance(&pool, origin_id).await, dec!(1000));
    assert_eq!(common::movement_count(&pool, origin_id).await, 0);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_transfer_limits() {
    let pool = common::setup_test_db().await;
    let sender = common::seed_user(&pool, "limit_sender", "CLIENT_ROLE").await;
    let receiver = common::seed_user(&pool, "limit_receiver", "CLIENT_ROLE").await;
    let (_, origin) = common::seed_account(&pool, sender, dec!(50000)).await;
    let (_, destination) = common::seed_account(&pool, receiver, dec!(0)).await;
    let app = test_app(pool.clone());

    let transfer = |amount: &str| {
        Request::builder()
            .method("POST")
            .uri(format!("/movements/transfer/{origin}"))
            .header("content-type", "application/json")
            .header("X-API-Key", API_KEY)
            .header("X-Request-User-Id", sender.to_string())
            .body(Body::from(
                json!({ "destination_account": destination, "amount": amount }).to_string(),
            ))
            .unwrap()
    };

    // Over the per-transaction cap
    let response = app.clone().oneshot(transfer("2000.01")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "transfer_limit_exceeded");

    // Five transfers at the cap exhaust the daily allowance
    for _ in 0..5 {
        let response = app.clone().oneshot(transfer("2000.00")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app.clone().oneshot(transfer("1.00")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "daily_limit_exceeded");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_daily_cap_ignores_incoming_transfers() {
    let pool = common::setup_test_db().await;
    let sender = common::seed_user(&pool, "cap_sender", "CLIENT_ROLE").await;
    let other = common::seed_user(&pool, "cap_other", "CLIENT_ROLE").await;
    let (_, a) = common::seed_account(&pool, sender, dec!(50000)).await;
    let (_, b) = common::seed_account(&pool, other, dec!(50000)).await;
    let app = test_app(pool.clone());

    // The other account sends 10000 INTO the sender's account
    for _ in 0..5 {
        let req = Request::builder()
            .method("POST")
            .uri(format!("/movements/transfer/{b}"))
            .header("content-type", "application/json")
            .header("X-API-Key", API_KEY)
            .header("X-Request-User-Id", other.to_string())
            .body(Body::from(
                json!({ "destination_account": a, "amount": "2000.00" }).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    // Incoming rows must not count against the sender's own daily allowance
    let req = Request::builder()
        .method("POST")
        .uri(format!("/movements/transfer/{a}"))
        .header("content-type", "application/json")
        .header("X-API-Key", API_KEY)
        .header("X-Request-User-Id", sender.to_string())
        .body(Body::from(
            json!({ "destination_account": b, "amount": "500.00" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_correct_and_revert_deposit() {
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "editable", "CLIENT_ROLE").await;
    let (account_id, number) = common::seed_account(&pool, owner, dec!(0)).await;
    let app = test_app(pool.clone());

    // Deposit 100.00
    let req = Request::builder()
        .method("POST")
        .uri("/movements/deposit")
        .header("content-type", "application/json")
        .header("X-API-Key", API_KEY)
        .body(Body::from(
            json!({ "destination_account": number, "amount": "100.00" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    let movement_id = body["movement"]["id"].as_str().unwrap().to_string();

    // Correct to 150.00
    let req = Request::builder()
        .method("PATCH")
        .uri(format!("/movements/{movement_id}/amount"))
        .header("content-type", "application/json")
        .header("X-API-Key", API_KEY)
        .body(Body::from(json!({ "new_amount": "150.00" }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK, "Correction failed");
    let body = json_body(response).await;
    assert_eq!(balance_of(&body, "new_balance"), dec!(150));
    assert_eq!(body["movement"]["id"].as_str().unwrap(), movement_id);

    // Revert entirely
    let req = Request::builder()
        .method("POST")
        .uri(format!("/movements/{movement_id}/revert"))
        .header("X-API-Key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK, "Revert failed");
    let body = json_body(response).await;
    assert_eq!(balance_of(&body, "new_balance"), dec!(0));
    assert_eq!(body["movement"]["status"], "REVERTED");

    // The row stays in the ledger
    assert_eq!(common::movement_count(&pool, account_id).await, 1);

    // A second revert is rejected
    let req = Request::builder()
        .method("POST")
        .uri(format!("/movements/{movement_id}/revert"))
        .header("X-API-Key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "already_reverted");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_revert_rejected_outside_edit_window() {
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "expired", "CLIENT_ROLE").await;
    let (_, number) = common::seed_account(&pool, owner, dec!(0)).await;
    let app = test_app(pool.clone());

    let req = Request::builder()
        .method("POST")
        .uri("/movements/deposit")
        .header("content-type", "application/json")
        .header("X-API-Key", API_KEY)
        .body(Body::from(
            json!({ "destination_account": number, "amount": "100.00" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let body = json_body(response).await;
    let movement_id = body["movement"]["id"].as_str().unwrap().to_string();

    // Age the deposit past the one-hour window
    sqlx::query("UPDATE movements SET created_at = NOW() - INTERVAL '61 minutes' WHERE id = $1::uuid")
        .bind(&movement_id)
        .execute(&pool)
        .await
        .unwrap();

    let req = Request::builder()
        .method("POST")
        .uri(format!("/movements/{movement_id}/revert"))
        .header("X-API-Key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "edit_window_expired");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_retried_deposit_creates_two_movements() {
    // No idempotency on money endpoints: the same payload twice means two
    // deposits, by design.
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "retry", "CLIENT_ROLE").await;
    let (account_id, number) = common::seed_account(&pool, owner, dec!(0)).await;
    let app = test_app(pool.clone());

    for _ in 0..2 {
        let req = Request::builder()
            .method("POST")
            .uri("/movements/deposit")
            .header("content-type", "application/json")
            .header("X-API-Key", API_KEY)
            .body(Body::from(
                json!({ "destination_account": number, "amount": "100.00" }).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    assert_eq!(common::movement_count(&pool, account_id).await, 2);
    assert_eq!(common::account_balance(&pool, account_id).await, dec!(200));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_account_lifecycle() {
    let pool = common::setup_test_db().await;
    let owner = common::seed_user(&pool, "fresh", "CLIENT_ROLE").await;
    let app = test_app(pool.clone());

    // Open
    let req = Request::builder()
        .method("POST")
        .uri("/accounts")
        .header("content-type", "application/json")
        .header("X-API-Key", API_KEY)
        .body(Body::from(
            json!({ "owner_id": owner, "account_type": "SAVER", "opening_balance": "250.00" })
                .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED, "Open failed");
    let body = json_body(response).await;
    let account_id = body["account"]["id"].as_str().unwrap().to_string();
    let number = body["account"]["number"].as_str().unwrap().to_string();
    assert!(number.starts_with("GT00"));

    // Listed under its owner
    let req = Request::builder()
        .method("GET")
        .uri(format!("/users/{owner}/accounts"))
        .header("X-API-Key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["accounts"].as_array().unwrap().len(), 1);

    // Close
    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/accounts/{account_id}"))
        .header("X-API-Key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Closed accounts refuse deposits
    let req = Request::builder()
        .method("POST")
        .uri("/movements/deposit")
        .header("content-type", "application/json")
        .header("X-API-Key", API_KEY)
        .body(Body::from(
            json!({ "destination_account": number, "amount": "10.00" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "account_inactive");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_missing_api_key_rejected() {
    let pool = common::setup_test_db().await;
    let app = test_app(pool);

    let req = Request::builder()
        .method("GET")
        .uri("/movements/top-accounts")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error_code"], "missing_api_key");
}
