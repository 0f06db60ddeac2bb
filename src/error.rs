//! Error types and HTTP error response handling.
//!
//! Every ledger operation returns `Result<T, AppError>`. The same enum is
//! converted into an HTTP response when it reaches a handler, so services never
//! deal with status codes themselves.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Lookup Errors**: a transaction or account does not exist
/// - **Validation Errors**: amount or request fields are invalid
/// - **Settlement Errors**: insufficient funds, transaction already processed
/// - **Access Errors**: unknown API key, role or ownership check failed
/// - **Storage Errors**: any sqlx error (hidden from clients)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying migrations at startup failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// API key is missing, invalid, or inactive.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// The authenticated principal may not perform this operation
    /// (role or ownership check failed).
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("Not authorized to perform this operation")]
    Unauthorized,

    /// Requested entity does not exist. The payload names the entity kind.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// An account referenced by a transaction does not exist.
    ///
    /// At creation time this is a plain validation failure; during settlement it
    /// means the ledger is inconsistent.
    #[error("Account not found")]
    AccountNotFound,

    /// Amount is zero, negative, or would overflow.
    #[error("Amount must be a positive number of minor units")]
    InvalidAmount,

    /// Account balance cannot cover the requested debit.
    ///
    /// Returns HTTP 422 Unprocessable Entity.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Settlement attempted on a transaction that already left `pending`.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Transaction has already been processed")]
    AlreadyProcessed,

    /// Request body or parameters are invalid.
    ///
    /// The String contains details about what was invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::InvalidApiKey => (
                StatusCode::UNAUTHORIZED,
                "invalid_api_key",
                self.to_string(),
            ),
            AppError::Unauthorized => (StatusCode::FORBIDDEN, "unauthorized", self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", self.to_string()),
            AppError::AccountNotFound => {
                (StatusCode::NOT_FOUND, "account_not_found", self.to_string())
            }
            AppError::InvalidAmount => {
                (StatusCode::BAD_REQUEST, "invalid_amount", self.to_string())
            }
            AppError::InsufficientFunds => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "insufficient_funds",
                self.to_string(),
            ),
            AppError::AlreadyProcessed => {
                (StatusCode::CONFLICT, "already_processed", self.to_string())
            }
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Database(ref err) => {
                tracing::error!(error = %err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Migration(ref err) => {
                tracing::error!(error = %err, "migration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settlement_errors_map_to_distinct_statuses() {
        assert_eq!(
            AppError::InsufficientFunds.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::AlreadyProcessed.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotFound("Transaction").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Unauthorized.into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::InvalidApiKey.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(
            AppError::NotFound("Transaction").to_string(),
            "Transaction not found"
        );
    }
}
