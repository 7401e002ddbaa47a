//! Amount helpers with precise decimal arithmetic
//!
//! The ledger works in a single currency, so amounts are plain
//! `rust_decimal::Decimal` values. This module owns the precision rule and
//! the sign checks every inbound amount goes through.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

/// Number of decimal places amounts are stored with
pub const MONEY_SCALE: u32 = 4;

/// Largest magnitude a single inbound amount may carry
pub const MAX_AMOUNT: Decimal = dec!(1000000000000);

/// Largest magnitude a stored balance or running total may reach
///
/// Matches the `NUMERIC(20,4)` columns amounts are persisted in.
pub const MAX_BALANCE: Decimal = dec!(9999999999999999.9999);

/// Errors that can occur while validating amounts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("{field} must not be negative (got {amount})")]
    Negative { field: &'static str, amount: Decimal },

    #[error("{field} must be greater than zero (got {amount})")]
    NotPositive { field: &'static str, amount: Decimal },

    #[error("{field} exceeds {limit} (got {amount})")]
    ExceedsLimit {
        field: &'static str,
        amount: Decimal,
        limit: Decimal,
    },

    #[error("{field} is out of range")]
    Overflow { field: &'static str },
}

/// Rounds an amount to the storage scale using banker's rounding
pub fn normalize(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, rust_decimal::RoundingStrategy::MidpointNearestEven)
}

/// Normalizes an amount and rejects magnitudes above [`MAX_AMOUNT`]
pub fn bounded(field: &'static str, amount: Decimal) -> Result<Decimal, MoneyError> {
    let amount = normalize(amount);
    if amount.abs() > MAX_AMOUNT {
        return Err(MoneyError::ExceedsLimit {
            field,
            amount,
            limit: MAX_AMOUNT,
        });
    }
    Ok(amount)
}

/// Normalizes an amount and rejects negatives
pub fn non_negative(field: &'static str, amount: Decimal) -> Result<Decimal, MoneyError> {
    let amount = bounded(field, amount)?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative { field, amount });
    }
    Ok(amount)
}

/// Normalizes an amount and rejects zero or negatives
pub fn positive(field: &'static str, amount: Decimal) -> Result<Decimal, MoneyError> {
    let amount = bounded(field, amount)?;
    if amount <= Decimal::ZERO {
        return Err(MoneyError::NotPositive { field, amount });
    }
    Ok(amount)
}

/// Adds two amounts, failing when the result leaves the storable range
pub fn checked_add(field: &'static str, lhs: Decimal, rhs: Decimal) -> Result<Decimal, MoneyError> {
    lhs.checked_add(rhs)
        .filter(|sum| sum.abs() <= MAX_BALANCE)
        .ok_or(MoneyError::Overflow { field })
}

/// Subtracts `rhs` from `lhs`, failing when the result leaves the storable range
pub fn checked_sub(field: &'static str, lhs: Decimal, rhs: Decimal) -> Result<Decimal, MoneyError> {
    lhs.checked_sub(rhs)
        .filter(|diff| diff.abs() <= MAX_BALANCE)
        .ok_or(MoneyError::Overflow { field })
}

/// Normalizes an amount and rejects values above `limit`
pub fn at_most(field: &'static str, amount: Decimal, limit: Decimal) -> Result<Decimal, MoneyError> {
    let amount = normalize(amount);
    if amount > limit {
        return Err(MoneyError::ExceedsLimit { field, amount, limit });
    }
    Ok(amount)
}
