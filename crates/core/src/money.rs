//! Money helpers
//!
//! Amounts are BRL held as [`Decimal`] and rounded to centavos.

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Number of decimal places kept for monetary amounts.
pub const MONEY_SCALE: u32 = 2;

/// An amount grew past what [`Decimal`] can represent.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("amount is too large to price")]
pub struct AmountOverflow;

/// `left + right`, failing instead of overflowing.
///
/// # Errors
///
/// Returns [`AmountOverflow`] when the sum is out of range.
pub fn checked_add(left: Decimal, right: Decimal) -> Result<Decimal, AmountOverflow> {
    left.checked_add(right).ok_or(AmountOverflow)
}

/// `left * right`, failing instead of overflowing.
///
/// # Errors
///
/// Returns [`AmountOverflow`] when the product is out of range.
pub fn checked_mul(left: Decimal, right: Decimal) -> Result<Decimal, AmountOverflow> {
    left.checked_mul(right).ok_or(AmountOverflow)
}

/// Round an amount to centavos, midpoint away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
