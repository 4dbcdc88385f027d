//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            // 401 Unauthorized
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "invalid_api_key", None),

            // 403 Forbidden
            AppError::PermissionDenied => (StatusCode::FORBIDDEN, "permission_denied", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone())),

            // 404 Not Found
            AppError::UserNotFound(id) => {
                (StatusCode::NOT_FOUND, "user_not_found", Some(id.clone()))
            }

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(ref domain_err) => {
                use crate::domain::DomainError;
                match domain_err {
                    DomainError::InsufficientFunds { .. } => (
                        StatusCode::BAD_REQUEST,
                        "insufficient_funds",
                        Some(domain_err.to_string()),
                    ),
                    DomainError::AccountInactive => {
                        (StatusCode::BAD_REQUEST, "account_inactive", None)
                    }
                    DomainError::InvalidAmount(msg) => {
                        (StatusCode::BAD_REQUEST, "invalid_amount", Some(msg.clone()))
                    }
                    DomainError::AccountNotFound(number) => (
                        StatusCode::NOT_FOUND,
                        "account_not_found",
                        Some(number.clone()),
                    ),
                    DomainError::MovementNotFound(id) => (
                        StatusCode::NOT_FOUND,
                        "movement_not_found",
                        Some(id.to_string()),
                    ),
                    DomainError::SameAccountTransfer => {
                        (StatusCode::BAD_REQUEST, "same_account_transfer", None)
                    }
                    DomainError::NotOwner(id) => {
                        (StatusCode::FORBIDDEN, "not_owner", Some(id.to_string()))
                    }
                    DomainError::PerTransactionLimitExceeded { .. } => (
                        StatusCode::BAD_REQUEST,
                        "transfer_limit_exceeded",
                        Some(domain_err.to_string()),
                    ),
                    DomainError::DailyLimitExceeded { .. } => (
                        StatusCode::BAD_REQUEST,
                        "daily_limit_exceeded",
                        Some(domain_err.to_string()),
                    ),
                    DomainError::WrongMovementType { .. } => (
                        StatusCode::BAD_REQUEST,
                        "wrong_movement_type",
                        Some(domain_err.to_string()),
                    ),
                    DomainError::AlreadyReverted => {
                        (StatusCode::BAD_REQUEST, "already_reverted", None)
                    }
                    DomainError::EditWindowExpired => {
                        (StatusCode::FORBIDDEN, "edit_window_expired", None)
                    }
                    DomainError::VersionConflict { .. } => (
                        StatusCode::CONFLICT,
                        "version_conflict",
                        Some(domain_err.to_string()),
                    ),
                }
            }

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
