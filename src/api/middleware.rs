//! API Middleware
//!
//! API-key authentication, caller-principal resolution and request logging.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Principal, Role};
use crate::error::AppError;
use crate::repository::AccountRepository;

/// API Key authentication result
#[derive(Debug, Clone)]
pub struct AuthenticatedApiKey {
    pub id: Uuid,
    pub name: String,
    pub permissions: Vec<String>,
}

impl AuthenticatedApiKey {
    /// Check if this API key has a specific permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission || p == "admin")
    }
}

/// Acting user from the X-Request-User-Id header
#[derive(Debug, Clone)]
pub struct RequestUser {
    pub user_id: Uuid,
}

/// SHA-256 of an API key as a hex string, the form stored in `api_keys.key_hash`
pub fn hash_api_key(key: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract and validate the API key from the X-API-Key header
pub async fn auth_middleware(
    State(pool): State<PgPool>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let api_key = match headers.get("X-API-Key").and_then(|v| v.to_str().ok()) {
        Some(key) => key,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Missing X-API-Key header",
                    "error_code": "missing_api_key"
                })),
            )
                .into_response());
        }
    };

    let key_hash = hash_api_key(api_key);

    let api_key_record: Option<(Uuid, String, Vec<String>, bool)> = match sqlx::query_as(
        r#"
        SELECT id, name, permissions, is_active
        FROM api_keys
        WHERE key_hash = $1
        "#,
    )
    .bind(&key_hash)
    .fetch_optional(&pool)
    .await
    {
        Ok(record) => record,
        Err(e) => {
            tracing::error!("Database error during API key validation: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error",
                    "error_code": "database_error"
                })),
            )
                .into_response());
        }
    };

    let (api_key_id, name, permissions, is_active) = match api_key_record {
        Some(record) => record,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Invalid API key",
                    "error_code": "invalid_api_key"
                })),
            )
                .into_response());
        }
    };

    if !is_active {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "API key is disabled",
                "error_code": "api_key_disabled"
            })),
        )
            .into_response());
    }

    request.extensions_mut().insert(AuthenticatedApiKey {
        id: api_key_id,
        name,
        permissions,
    });

    // X-Request-User-Id identifies the acting client; endpoints that need
    // an owner check look for the RequestUser extension.
    if let Some(user_id_str) = headers.get("X-Request-User-Id").and_then(|v| v.to_str().ok()) {
        match Uuid::parse_str(user_id_str) {
            Ok(user_id) => {
                request.extensions_mut().insert(RequestUser { user_id });
            }
            Err(_) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "Invalid X-Request-User-Id header format",
                        "error_code": "invalid_user_id"
                    })),
                )
                    .into_response());
            }
        }
    }

    Ok(next.run(request).await)
}

/// Resolve the full caller principal for an acting user: role from the
/// users table, owned accounts from the accounts table.
pub async fn resolve_principal(pool: &PgPool, user_id: Uuid) -> Result<Principal, AppError> {
    let user: Option<(String, bool)> =
        sqlx::query_as("SELECT role, is_active FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    let (role, is_active) = user.ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;

    if !is_active {
        return Err(AppError::Forbidden("User is inactive".to_string()));
    }

    let role = Role::parse(&role)
        .ok_or_else(|| AppError::Internal(format!("unknown role in users table: {role}")))?;

    let account_ids = AccountRepository::new(pool.clone())
        .find_ids_by_owner(user_id)
        .await?;

    let correlation_id = Uuid::new_v4();
    Ok(Principal::new(user_id, role)
        .with_accounts(account_ids)
        .with_correlation_id(correlation_id))
}

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["x-api-key", "authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let version = request.version();

    let headers = mask_headers_for_logging(request.headers());

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        version = ?version,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    response
}
