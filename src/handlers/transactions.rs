//! Transaction HTTP handlers.
//!
//! This module implements transaction-related API endpoints:
//! - POST /api/v1/transactions - Request a transaction (caller is the source)
//! - GET /api/v1/transactions/mine - Caller's transactions
//! - GET /api/v1/transactions - All transactions (admin)
//! - GET /api/v1/transactions/pending - Transactions awaiting settlement (admin)
//! - GET /api/v1/transactions/stats - Per-status counts and sums
//! - GET /api/v1/transactions/{id} - Transaction details
//! - PUT /api/v1/transactions/{id}/settle - Approve, reject or complete (admin)

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        api_key::Principal,
        stats::{StatsQuery, TransactionStats},
        transaction::{CreateTransactionRequest, SettleRequest, Transaction},
    },
    services::{settlement_service, stats_service, transaction_service},
    state::AppState,
    store::LedgerStore,
};

/// Request a transaction.
///
/// # Request Body
///
/// ```json
/// {
///   "to_account_id": "660e8400-...",
///   "amount_cents": 50000,
///   "transaction_type": "transfer",
///   "description": "Rent",
///   "is_international": false
/// }
/// ```
///
/// # Response (201)
///
/// The stored transaction in `pending` status with its commission.
pub async fn create_transaction<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    let transaction = transaction_service::create_transaction(
        &state.store,
        &state.settings,
        Some(principal.account_id),
        request,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Transactions where the caller is source or destination, newest first.
pub async fn list_my_transactions<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let transactions =
        transaction_service::list_for_account(&state.store, principal.account_id).await?;
    Ok(Json(transactions))
}

pub async fn list_all_transactions<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let transactions = transaction_service::list_all(&state.store, &principal).await?;
    Ok(Json(transactions))
}

pub async fn list_pending_transactions<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    let transactions = transaction_service::list_pending(&state.store, &principal).await?;
    Ok(Json(transactions))
}

/// Per-status counts and amount sums.
///
/// `?account_id=` narrows the report to one account; non-admins always get
/// their own.
pub async fn transaction_stats<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<TransactionStats>, AppError> {
    let stats =
        stats_service::transaction_stats(&state.store, &principal, query.account_id).await?;
    Ok(Json(stats))
}

/// Get transaction by ID.
///
/// # Security
///
/// Returns 403 unless the caller is a party to the transaction or an admin.
pub async fn get_transaction<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<Transaction>, AppError> {
    let transaction =
        transaction_service::get_transaction(&state.store, &principal, transaction_id).await?;
    Ok(Json(transaction))
}

/// Settle a pending transaction.
///
/// # Request Body
///
/// ```json
/// {
///   "status": "approved",
///   "remarks": "Verified"
/// }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: the settled transaction
/// - **Error (409)**: already processed
/// - **Error (422)**: insufficient funds; the transaction stays pending
pub async fn settle_transaction<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
    Path(transaction_id): Path<Uuid>,
    Json(request): Json<SettleRequest>,
) -> Result<Json<Transaction>, AppError> {
    let transaction =
        settlement_service::settle(&state.store, &principal, transaction_id, request).await?;
    Ok(Json(transaction))
}
