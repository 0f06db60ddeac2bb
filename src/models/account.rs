//! Account data models and API request/response types.
//!
//! This module defines:
//! - `Account`: Database entity holding a participant's balance
//! - `OpenAccountRequest`: Request body for provisioning accounts
//! - `OpenAccountResponse`: Response carrying the one-time API key

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::api_key::Role;

/// Represents an account record from the database.
///
/// # Balance Storage
///
/// Balances are stored as `i64` cents to avoid floating-point precision issues.
///
/// For example:
/// - $10.50 is stored as 1050 cents
/// - $100.00 is stored as 10000 cents
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Account {
    /// Unique identifier for this account
    pub id: Uuid,

    /// Human-readable name for this account
    pub account_name: String,

    /// Current balance in cents (not dollars)
    ///
    /// Must be >= 0 (enforced by database CHECK constraint and by every store).
    pub balance_cents: i64,

    /// Timestamp when account was created
    pub created_at: DateTime<Utc>,

    /// Timestamp of last balance update
    pub updated_at: DateTime<Utc>,
}

/// Request body for opening a new account.
///
/// # JSON Example
///
/// ```json
/// {
///   "account_name": "Alice",
///   "role": "USER"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAccountRequest {
    pub account_name: String,

    /// Role granted to the API key issued with the account (defaults to USER)
    #[serde(default)]
    pub role: Role,
}

/// Response body for account provisioning.
///
/// The plaintext `api_key` is only ever returned here; the store keeps its hash.
#[derive(Debug, Serialize)]
pub struct OpenAccountResponse {
    pub account: Account,
    pub role: Role,
    pub api_key: String,
}
