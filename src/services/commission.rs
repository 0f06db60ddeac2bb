//! Commission calculation.
//!
//! The fee depends only on the amount and whether the movement crosses a
//! border; the transaction type plays no part. Rates are in basis points.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

use crate::error::AppError;

/// 10% for international movements.
pub const INTERNATIONAL_RATE_BPS: i64 = 1_000;

/// 2% for domestic movements.
pub const DOMESTIC_RATE_BPS: i64 = 200;

/// Basis points are hundredths of a percent: four decimal places.
const BPS_SCALE: u32 = 4;

/// Commission in cents for `amount_cents`.
///
/// Uses banker's rounding (round half to even) to whole cents, so a long run
/// of half-cent fees does not drift in either direction.
///
/// # Errors
///
/// - `InvalidAmount`: `amount_cents` is negative
pub fn commission(amount_cents: i64, is_international: bool) -> Result<i64, AppError> {
    if amount_cents < 0 {
        return Err(AppError::InvalidAmount);
    }

    let rate_bps = if is_international {
        INTERNATIONAL_RATE_BPS
    } else {
        DOMESTIC_RATE_BPS
    };
    let rate = Decimal::new(rate_bps, BPS_SCALE);

    Decimal::from(amount_cents)
        .checked_mul(rate)
        .map(|fee| fee.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven))
        .and_then(|fee| fee.to_i64())
        .ok_or(AppError::InvalidAmount)
}
