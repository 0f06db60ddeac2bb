//! Transaction service - requesting and reading ledger transactions.
//!
//! This service handles:
//! - Validation of new requests (amount, accounts, description)
//! - The non-authoritative balance pre-check at request time
//! - Commission computation
//! - Access-checked reads and listings
//!
//! Balances are never touched here; only settlement moves money.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        api_key::Principal,
        transaction::{
            CreateTransactionRequest, NewTransaction, Transaction, TransactionFilter,
            TransactionType,
        },
    },
    services::commission::commission,
    store::LedgerStore,
};

pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Largest amount a single request may carry: ten trillion in major units.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000_000;

/// Knobs for request-time behaviour.
#[derive(Debug, Clone, Copy)]
pub struct LedgerSettings {
    /// Refuse requests whose source balance is already below the amount.
    ///
    /// Settlement re-checks regardless; this only fails fast.
    pub balance_precheck: bool,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            balance_precheck: true,
        }
    }
}

/// Record a new `pending` transaction.
///
/// # Process
///
/// 1. Validate amount, description and source/destination shape
/// 2. Resolve both accounts
/// 3. Optionally pre-check the source balance
/// 4. Compute commission and store the record
///
/// # Arguments
///
/// * `store` - Ledger storage
/// * `settings` - Request-time settings
/// * `from_account_id` - Source account; may be `None` only for deposits
/// * `request` - Destination, amount, type, description, internationality
///
/// # Errors
///
/// - `InvalidAmount`: amount is not in `1..=MAX_AMOUNT_CENTS`
/// - `InvalidRequest`: missing source, same-account transfer, description too long
/// - `AccountNotFound`: source or destination does not exist
/// - `InsufficientFunds`: pre-check enabled and source balance below amount
pub async fn create_transaction<S: LedgerStore>(
    store: &S,
    settings: &LedgerSettings,
    from_account_id: Option<Uuid>,
    request: CreateTransactionRequest,
) -> Result<Transaction, AppError> {
    // Validate amount
    if request.amount_cents <= 0 || request.amount_cents > MAX_AMOUNT_CENTS {
        return Err(AppError::InvalidAmount);
    }

    if let Some(description) = &request.description {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(AppError::InvalidRequest(format!(
                "Description must not exceed {MAX_DESCRIPTION_LEN} characters"
            )));
        }
    }

    let transaction_type = request.transaction_type;

    if from_account_id.is_none() && transaction_type != TransactionType::Deposit {
        return Err(AppError::InvalidRequest(format!(
            "A {transaction_type} requires a source account"
        )));
    }

    // Prevent paying into the same account
    if matches!(
        transaction_type,
        TransactionType::Transfer | TransactionType::Payment
    ) && from_account_id == Some(request.to_account_id)
    {
        return Err(AppError::InvalidRequest(
            "Cannot transfer to same account".to_string(),
        ));
    }

    store
        .get_account(request.to_account_id)
        .await?
        .ok_or(AppError::AccountNotFound)?;

    if let Some(source_id) = from_account_id {
        let source = store
            .get_account(source_id)
            .await?
            .ok_or(AppError::AccountNotFound)?;

        if settings.balance_precheck
            && transaction_type.debits_source()
            && source.balance_cents < request.amount_cents
        {
            return Err(AppError::InsufficientFunds);
        }
    }

    let commission_cents = commission(request.amount_cents, request.is_international)?;

    let transaction = store
        .insert_transaction(NewTransaction {
            id: Uuid::new_v4(),
            from_account_id,
            to_account_id: request.to_account_id,
            amount_cents: request.amount_cents,
            transaction_type,
            is_international: request.is_international,
            commission_cents,
            description: request.description,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(
        transaction_id = %transaction.id,
        transaction_type = %transaction.transaction_type,
        amount_cents = transaction.amount_cents,
        commission_cents = transaction.commission_cents,
        "transaction requested"
    );

    Ok(transaction)
}

/// Get a transaction the caller is a party to (admins see all).
///
/// # Errors
///
/// - `NotFound`: no such transaction
/// - `Unauthorized`: caller is neither a party nor an admin
pub async fn get_transaction<S: LedgerStore>(
    store: &S,
    caller: &Principal,
    transaction_id: Uuid,
) -> Result<Transaction, AppError> {
    let transaction = store
        .get_transaction(transaction_id)
        .await?
        .ok_or(AppError::NotFound("Transaction"))?;

    if !caller.is_admin() && !transaction.involves(caller.account_id) {
        return Err(AppError::Unauthorized);
    }

    Ok(transaction)
}

/// All transactions where `account_id` is source or destination, newest first.
pub async fn list_for_account<S: LedgerStore>(
    store: &S,
    account_id: Uuid,
) -> Result<Vec<Transaction>, AppError> {
    store
        .list_transactions(TransactionFilter::Account(account_id))
        .await
}

/// Every transaction, newest first. Admin only.
pub async fn list_all<S: LedgerStore>(
    store: &S,
    caller: &Principal,
) -> Result<Vec<Transaction>, AppError> {
    if !caller.is_admin() {
        return Err(AppError::Unauthorized);
    }
    store.list_transactions(TransactionFilter::All).await
}

/// Transactions still awaiting settlement, newest first. Admin only.
pub async fn list_pending<S: LedgerStore>(
    store: &S,
    caller: &Principal,
) -> Result<Vec<Transaction>, AppError> {
    if !caller.is_admin() {
        return Err(AppError::Unauthorized);
    }
    store.list_transactions(TransactionFilter::Pending).await
}
