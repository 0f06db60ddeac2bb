//! Account HTTP handlers.
//!
//! This module implements the account-related API endpoints:
//! - POST /api/v1/accounts - Open a new account (admin)
//! - GET /api/v1/accounts/me - The caller's own account
//! - GET /api/v1/accounts/{id} - Get account by ID (owner or admin)

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::{Account, OpenAccountRequest, OpenAccountResponse},
        api_key::Principal,
    },
    services::account_service,
    state::AppState,
    store::LedgerStore,
};

/// Open a new account.
///
/// # Request Body
///
/// ```json
/// {
///   "account_name": "Alice",
///   "role": "USER"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the account and its API key (shown only once)
/// - **Error (403)**: caller is not an admin
pub async fn open_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<OpenAccountRequest>,
) -> Result<(StatusCode, Json<OpenAccountResponse>), AppError> {
    let response = account_service::open_account(&state.store, &principal, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// The caller's own account and balance.
pub async fn get_my_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Account>, AppError> {
    let account =
        account_service::get_account(&state.store, &principal, principal.account_id).await?;
    Ok(Json(account))
}

/// Get a specific account by ID.
///
/// # Response
///
/// - **Success (200 OK)**: account details
/// - **Error (403)**: account belongs to someone else and caller is not an admin
/// - **Error (404)**: account not found
pub async fn get_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Extension(principal): Extension<Principal>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<Account>, AppError> {
    let account = account_service::get_account(&state.store, &principal, account_id).await?;
    Ok(Json(account))
}
