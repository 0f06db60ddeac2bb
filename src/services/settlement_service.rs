//! Settlement engine - moves a pending transaction to its terminal status.
//!
//! The state machine itself is pure: given the live transaction record and a
//! [`SettlementRequest`], [`plan_movements`] decides which balances change and
//! by how much, and [`settled`] produces the updated record. Stores call both
//! inside their own atomic unit of work, so the pending check always runs
//! against the row they just locked.
//!
//! # Effects by target status
//!
//! - `rejected`: no balance changes
//! - `approved` / `completed`:
//!   - transfer, payment: source `-(amount + commission)`, destination `+amount`
//!   - deposit: destination `+amount`
//!   - withdrawal: source `-(amount + commission)`
//!
//! The commission is deducted but credited to nobody.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        api_key::Principal,
        transaction::{SettleRequest, Transaction, TransactionStatus},
    },
    store::LedgerStore,
};

pub const MAX_REMARKS_LEN: usize = 1000;

/// A validated request to settle one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementRequest {
    pub transaction_id: Uuid,
    pub target: TransactionStatus,
    pub approver_id: Uuid,
    pub remarks: Option<String>,
    pub requested_at: DateTime<Utc>,
}

/// A signed change to one account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceMovement {
    pub account_id: Uuid,
    pub delta_cents: i64,
}

/// Balance movements needed to settle `live` as `request.target`.
///
/// Debits come before credits.
///
/// # Errors
///
/// - `AlreadyProcessed`: `live` is not pending
/// - `InvalidRequest`: the target status is `pending`
/// - `AccountNotFound`: a debiting transaction has no source account
/// - `InvalidAmount`: `amount + commission` overflows
pub fn plan_movements(
    live: &Transaction,
    request: &SettlementRequest,
) -> Result<Vec<BalanceMovement>, AppError> {
    if live.status != TransactionStatus::Pending {
        return Err(AppError::AlreadyProcessed);
    }
    if !request.target.is_terminal() {
        return Err(AppError::InvalidRequest(
            "Target status must be approved, rejected or completed".to_string(),
        ));
    }
    if !request.target.moves_funds() {
        return Ok(Vec::new());
    }

    let mut movements = Vec::with_capacity(2);

    if live.transaction_type.debits_source() {
        let source = live.from_account_id.ok_or(AppError::AccountNotFound)?;
        let debit = live
            .amount_cents
            .checked_add(live.commission_cents)
            .ok_or(AppError::InvalidAmount)?;
        movements.push(BalanceMovement {
            account_id: source,
            delta_cents: -debit,
        });
    }

    if live.transaction_type.credits_destination() {
        movements.push(BalanceMovement {
            account_id: live.to_account_id,
            delta_cents: live.amount_cents,
        });
    }

    Ok(movements)
}

/// Accounts a settlement of `live` has to read and lock, in ascending id order.
#[must_use]
pub fn referenced_accounts(live: &Transaction) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = live
        .from_account_id
        .into_iter()
        .chain(std::iter::once(live.to_account_id))
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// New balance after adding `delta_cents`.
///
/// # Errors
///
/// - `InsufficientFunds`: a debit would take the balance below zero
/// - `InvalidAmount`: the addition overflows
pub fn apply_delta(balance_cents: i64, delta_cents: i64) -> Result<i64, AppError> {
    let next = balance_cents
        .checked_add(delta_cents)
        .ok_or(AppError::InvalidAmount)?;
    if next < 0 && delta_cents < 0 {
        return Err(AppError::InsufficientFunds);
    }
    Ok(next)
}

/// Apply `movements` to staged `balances` in order.
///
/// `balances` is a scratch copy; on error callers discard it so nothing is
/// partially applied.
pub fn apply_movements(
    balances: &mut HashMap<Uuid, i64>,
    movements: &[BalanceMovement],
) -> Result<(), AppError> {
    for movement in movements {
        let balance = balances
            .get_mut(&movement.account_id)
            .ok_or(AppError::AccountNotFound)?;
        *balance = apply_delta(*balance, movement.delta_cents)?;
    }
    Ok(())
}

/// The record after a successful settlement.
#[must_use]
pub fn settled(mut live: Transaction, request: &SettlementRequest) -> Transaction {
    live.status = request.target;
    live.processed_by = Some(request.approver_id);
    live.processed_at = Some(request.requested_at);
    if let Some(remarks) = &request.remarks {
        live.remarks = Some(remarks.clone());
    }
    live.updated_at = request.requested_at;
    live
}

/// Settle a pending transaction on behalf of `approver`.
///
/// # Process
///
/// 1. Check the approver holds the ADMIN role
/// 2. Validate target status and remarks
/// 3. Hand the request to the store, which locks, re-checks and writes atomically
///
/// # Errors
///
/// - `Unauthorized`: approver is not an admin
/// - `InvalidRequest`: target is `pending` or remarks are too long
/// - `NotFound`, `AlreadyProcessed`, `InsufficientFunds`, `AccountNotFound`: from the store
pub async fn settle<S: LedgerStore>(
    store: &S,
    approver: &Principal,
    transaction_id: Uuid,
    request: SettleRequest,
) -> Result<Transaction, AppError> {
    if !approver.is_admin() {
        return Err(AppError::Unauthorized);
    }
    if !request.status.is_terminal() {
        return Err(AppError::InvalidRequest(
            "Target status must be approved, rejected or completed".to_string(),
        ));
    }
    if let Some(remarks) = &request.remarks {
        if remarks.chars().count() > MAX_REMARKS_LEN {
            return Err(AppError::InvalidRequest(format!(
                "Remarks must not exceed {MAX_REMARKS_LEN} characters"
            )));
        }
    }

    let settlement = SettlementRequest {
        transaction_id,
        target: request.status,
        approver_id: approver.account_id,
        remarks: request.remarks,
        requested_at: Utc::now(),
    };

    match store.settle(&settlement).await {
        Ok(transaction) => {
            tracing::info!(
                transaction_id = %transaction.id,
                status = %transaction.status,
                approver = %approver.account_id,
                "transaction settled"
            );
            Ok(transaction)
        }
        Err(err @ (AppError::InsufficientFunds | AppError::AlreadyProcessed)) => {
            tracing::warn!(%transaction_id, error = %err, "settlement refused");
            Err(err)
        }
        Err(AppError::AccountNotFound) => {
            tracing::error!(
                %transaction_id,
                "settlement references an account that no longer exists"
            );
            Err(AppError::AccountNotFound)
        }
        Err(err) => Err(err),
    }
}
