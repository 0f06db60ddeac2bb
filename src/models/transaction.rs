//! Transaction data models and API request types.
//!
//! This module defines:
//! - `TransactionType` / `TransactionStatus`: closed enums mirrored by PostgreSQL enum types
//! - `Transaction`: Database entity representing a ledger transaction
//! - `NewTransaction`: validated payload handed to the store on creation
//! - Request bodies for creating and settling transactions

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of money movement requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
pub enum TransactionType {
    Transfer,
    Deposit,
    Withdrawal,
    Payment,
}

impl TransactionType {
    /// Whether settlement takes `amount + commission` out of the source account.
    #[must_use]
    pub fn debits_source(self) -> bool {
        matches!(self, Self::Transfer | Self::Payment | Self::Withdrawal)
    }

    /// Whether settlement adds `amount` to the destination account.
    #[must_use]
    pub fn credits_destination(self) -> bool {
        matches!(self, Self::Transfer | Self::Payment | Self::Deposit)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Payment => "payment",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a transaction.
///
/// The only valid transitions are `Pending` to any of the three terminal
/// states. Nothing leaves a terminal state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 4] = [
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::Completed,
    ];

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Whether reaching this status moves money between accounts.
    #[must_use]
    pub fn moves_funds(self) -> bool {
        matches!(self, Self::Approved | Self::Completed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a transaction record from the database.
///
/// # Database Table
///
/// Maps to the `transactions` table. Each transaction:
/// - References a destination account and, except for deposits, a source account
/// - Stores amount and commission in cents (never floats)
/// - Carries `processed_by` / `processed_at` exactly when it is no longer pending
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Transaction {
    pub id: Uuid,

    /// Source account. `None` only for deposits.
    pub from_account_id: Option<Uuid>,

    pub to_account_id: Uuid,

    /// Requested amount in cents, always positive.
    pub amount_cents: i64,

    pub transaction_type: TransactionType,

    pub status: TransactionStatus,

    pub is_international: bool,

    /// Fee derived from `amount_cents` and `is_international` at creation.
    /// Deducted from the source on settlement and credited to nobody.
    pub commission_cents: i64,

    pub description: Option<String>,

    /// Approver who moved the transaction out of `pending`.
    pub processed_by: Option<Uuid>,

    pub processed_at: Option<DateTime<Utc>>,

    pub remarks: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Whether `account_id` is the source or the destination.
    #[must_use]
    pub fn involves(&self, account_id: Uuid) -> bool {
        self.from_account_id == Some(account_id) || self.to_account_id == account_id
    }
}

/// A validated transaction ready to be stored in `pending` status.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub id: Uuid,
    pub from_account_id: Option<Uuid>,
    pub to_account_id: Uuid,
    pub amount_cents: i64,
    pub transaction_type: TransactionType,
    pub is_international: bool,
    pub commission_cents: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    /// The record as it looks right after insertion.
    #[must_use]
    pub fn into_pending(self) -> Transaction {
        Transaction {
            id: self.id,
            from_account_id: self.from_account_id,
            to_account_id: self.to_account_id,
            amount_cents: self.amount_cents,
            transaction_type: self.transaction_type,
            status: TransactionStatus::Pending,
            is_international: self.is_international,
            commission_cents: self.commission_cents,
            description: self.description,
            processed_by: None,
            processed_at: None,
            remarks: None,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Request body for proposing a transaction. The caller is the source account.
///
/// # JSON Example
///
/// ```json
/// {
///   "to_account_id": "660e8400-e29b-41d4-a716-446655440001",
///   "amount_cents": 50000,
///   "transaction_type": "transfer",
///   "description": "Rent",
///   "is_international": false
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransactionRequest {
    pub to_account_id: Uuid,

    pub amount_cents: i64,

    pub transaction_type: TransactionType,

    pub description: Option<String>,

    #[serde(default)]
    pub is_international: bool,
}

/// Request body for moving a pending transaction to a terminal status.
///
/// # JSON Example
///
/// ```json
/// {
///   "status": "approved",
///   "remarks": "Checked against invoice 42"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SettleRequest {
    pub status: TransactionStatus,

    pub remarks: Option<String>,
}

/// Selects which transactions a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionFilter {
    All,
    Pending,
    /// Transactions where the account is the source or the destination.
    Account(Uuid),
}

impl TransactionFilter {
    #[must_use]
    pub fn matches(&self, transaction: &Transaction) -> bool {
        match self {
            Self::All => true,
            Self::Pending => transaction.status == TransactionStatus::Pending,
            Self::Account(account_id) => transaction.involves(*account_id),
        }
    }
}
