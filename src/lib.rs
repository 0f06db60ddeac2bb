//! Approval ledger - transfers between accounts that settle only after an
//! administrator approves them.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Storage**: PostgreSQL with sqlx, or an in-memory store for development
//! - **Authentication**: API key with SHA-256 hashing, resolving to a principal
//! - **Format**: JSON requests/responses
//!
//! # Lifecycle
//!
//! A user requests a transaction, which is stored as `pending` with its
//! commission. An admin then settles it as `approved`, `completed` or
//! `rejected`. Balances change only on approval or completion, atomically with
//! the status change.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod store;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::{state::AppState, store::LedgerStore};

/// Build the HTTP router over any store.
pub fn app<S: LedgerStore>(state: AppState<S>) -> Router {
    let authenticated_routes = Router::new()
        // Account routes
        .route("/api/v1/accounts", post(handlers::accounts::open_account::<S>))
        .route(
            "/api/v1/accounts/me",
            get(handlers::accounts::get_my_account::<S>),
        )
        .route(
            "/api/v1/accounts/{id}",
            get(handlers::accounts::get_account::<S>),
        )
        // Transaction routes
        .route(
            "/api/v1/transactions",
            post(handlers::transactions::create_transaction::<S>)
                .get(handlers::transactions::list_all_transactions::<S>),
        )
        .route(
            "/api/v1/transactions/mine",
            get(handlers::transactions::list_my_transactions::<S>),
        )
        .route(
            "/api/v1/transactions/pending",
            get(handlers::transactions::list_pending_transactions::<S>),
        )
        .route(
            "/api/v1/transactions/stats",
            get(handlers::transactions::transaction_stats::<S>),
        )
        .route(
            "/api/v1/transactions/{id}",
            get(handlers::transactions::get_transaction::<S>),
        )
        .route(
            "/api/v1/transactions/{id}/settle",
            put(handlers::transactions::settle_transaction::<S>),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware::<S>,
        ));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check::<S>))
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
