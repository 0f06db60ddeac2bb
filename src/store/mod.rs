//! Storage abstraction for accounts, credentials and transactions.
//!
//! Services only talk to [`LedgerStore`]. Two implementations exist:
//! - [`postgres::PgStore`]: the production store, backed by sqlx and PostgreSQL
//! - [`memory::MemoryStore`]: everything behind one mutex, used for development
//!   runs without a database and for tests
//!
//! Whatever the backend, `settle` is the one operation that must be a single
//! indivisible unit: pending check, balance reads, balance writes and the
//! status write commit together or not at all.

use std::future::Future;

use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        account::Account,
        api_key::{ApiKey, Principal},
        stats::StatusTotals,
        transaction::{NewTransaction, Transaction, TransactionFilter},
    },
    services::settlement_service::SettlementRequest,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub trait LedgerStore: Clone + Send + Sync + 'static {
    /// Verify the backend is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), AppError>> + Send;

    fn insert_account(
        &self,
        account: Account,
    ) -> impl Future<Output = Result<Account, AppError>> + Send;

    fn get_account(
        &self,
        account_id: Uuid,
    ) -> impl Future<Output = Result<Option<Account>, AppError>> + Send;

    /// Apply a signed delta to a balance as one check-and-set.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such account
    /// - `InsufficientFunds`: a negative delta would take the balance below zero
    fn adjust_balance(
        &self,
        account_id: Uuid,
        delta_cents: i64,
    ) -> impl Future<Output = Result<Account, AppError>> + Send;

    /// Store an account together with the API key that acts for it.
    ///
    /// Either both rows are written or neither is.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: the key hash or the account id is already taken
    fn insert_account_with_key(
        &self,
        account: Account,
        api_key: ApiKey,
    ) -> impl Future<Output = Result<Account, AppError>> + Send;

    /// Resolve an active API key hash to the principal it acts for.
    fn find_principal(
        &self,
        key_hash: &str,
    ) -> impl Future<Output = Result<Option<Principal>, AppError>> + Send;

    /// Store a new `pending` transaction.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound`: a referenced account does not exist
    fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> impl Future<Output = Result<Transaction, AppError>> + Send;

    fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> impl Future<Output = Result<Option<Transaction>, AppError>> + Send;

    /// Transactions matching `filter`, newest first.
    fn list_transactions(
        &self,
        filter: TransactionFilter,
    ) -> impl Future<Output = Result<Vec<Transaction>, AppError>> + Send;

    /// Move a pending transaction to its terminal status, applying its balance
    /// movements against the live account rows.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no such transaction
    /// - `AlreadyProcessed`: the transaction is no longer pending
    /// - `InsufficientFunds`: the source cannot cover `amount + commission`
    /// - `AccountNotFound`: a referenced account disappeared
    ///
    /// On any error nothing is written.
    fn settle(
        &self,
        request: &SettlementRequest,
    ) -> impl Future<Output = Result<Transaction, AppError>> + Send;

    /// Count and amount sum per status, optionally restricted to transactions
    /// involving `account_id`. Statuses without transactions are omitted.
    fn status_totals(
        &self,
        account_id: Option<Uuid>,
    ) -> impl Future<Output = Result<Vec<StatusTotals>, AppError>> + Send;
}
