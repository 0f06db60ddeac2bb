//! Per-status projection of the ledger.
//!
//! Read-only and advisory: a settlement committing while the report is built
//! may or may not be reflected. Never use these numbers for balance decisions.

use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        api_key::Principal,
        stats::{StatusSummary, StatusTotals, TransactionStats},
        transaction::TransactionStatus,
    },
    store::LedgerStore,
};

/// Count and amount per status.
///
/// Admins may ask for any account or for the whole ledger. Users always get
/// their own account; asking for another one is `Unauthorized`.
pub async fn transaction_stats<S: LedgerStore>(
    store: &S,
    caller: &Principal,
    account_id: Option<Uuid>,
) -> Result<TransactionStats, AppError> {
    let scope = if caller.is_admin() {
        account_id
    } else {
        match account_id {
            Some(id) if id != caller.account_id => return Err(AppError::Unauthorized),
            _ => Some(caller.account_id),
        }
    };

    let totals = store.status_totals(scope).await?;
    summarize(totals)
}

/// Fold grouped rows into a report that lists every status.
///
/// # Errors
///
/// - `InvalidAmount`: a sum does not fit the report
pub fn summarize(totals: Vec<StatusTotals>) -> Result<TransactionStats, AppError> {
    let mut stats: TransactionStats = TransactionStatus::ALL
        .into_iter()
        .map(|status| (status, StatusSummary::default()))
        .collect();

    for row in totals {
        let total_amount_cents = row
            .total_amount_cents
            .to_i128()
            .ok_or(AppError::InvalidAmount)?;

        let summary = stats.entry(row.status).or_default();
        summary.count = summary
            .count
            .checked_add(row.count)
            .ok_or(AppError::InvalidAmount)?;
        summary.total_amount_cents = summary
            .total_amount_cents
            .checked_add(total_amount_cents)
            .ok_or(AppError::InvalidAmount)?;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn missing_statuses_report_zero() {
        let stats = summarize(vec![StatusTotals {
            status: TransactionStatus::Rejected,
            count: 3,
            total_amount_cents: Decimal::from(900),
        }])
        .unwrap();

        assert_eq!(stats.len(), 4);
        assert_eq!(
            stats[&TransactionStatus::Rejected],
            StatusSummary {
                count: 3,
                total_amount_cents: 900,
            }
        );
        assert_eq!(stats[&TransactionStatus::Pending], StatusSummary::default());
    }

    #[test]
    fn report_serializes_with_status_keys() {
        let json = serde_json::to_value(summarize(Vec::new()).unwrap()).unwrap();
        assert_eq!(
            json["completed"],
            serde_json::json!({"count": 0, "total_amount_cents": 0})
        );
    }

    #[test]
    fn totals_beyond_i64_are_reported_exactly() {
        let max = Decimal::from(i64::MAX);
        let stats = summarize(vec![StatusTotals {
            status: TransactionStatus::Approved,
            count: 3,
            total_amount_cents: max + max + max,
        }])
        .unwrap();

        assert_eq!(
            stats[&TransactionStatus::Approved].total_amount_cents,
            3 * i128::from(i64::MAX)
        );

        let body = serde_json::to_string(&stats).unwrap();
        assert!(body.contains(&format!("\"total_amount_cents\":{}", 3 * i128::from(i64::MAX))));
    }
}
