//! Per-status aggregates over the transaction ledger.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::transaction::TransactionStatus;

/// One grouped row: how many transactions sit in `status` and their summed amount.
///
/// The sum is a `NUMERIC` in PostgreSQL; a handful of large amounts already
/// exceeds `BIGINT`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StatusTotals {
    pub status: TransactionStatus,
    pub count: i64,
    pub total_amount_cents: Decimal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub count: i64,
    pub total_amount_cents: i128,
}

/// Report keyed by every status, including those with no transactions.
pub type TransactionStats = BTreeMap<TransactionStatus, StatusSummary>;

/// Query string for the stats endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    pub account_id: Option<uuid::Uuid>,
}
