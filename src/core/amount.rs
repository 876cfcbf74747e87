//! Fixed-point amounts.
//!
//! The store keeps meal counts in tenths and money in cents as plain integers, so
//! SQL sums are exact. Everything above the store works in [`Decimal`]. The
//! conversions here reject any value the integer form cannot hold exactly.
//!
//! Rounding rule: money is rounded to 2 decimal places, half away from zero.

use crate::errors::{Error, Result};
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for meal counts.
pub const MEAL_SCALE: u32 = 1;
/// Decimal places kept for money.
pub const MONEY_SCALE: u32 = 2;

/// Largest meal count accepted for one cell, in tenths (999.5 meals).
pub const MAX_MEAL_TENTHS: i64 = 9_995;
/// Largest single expense accepted, in cents (9,999,999,999.99).
pub const MAX_AMOUNT_CENTS: i64 = 999_999_999_999;

/// Converts a meal count to tenths.
///
/// The count must be non-negative, a multiple of 0.5 and at most 999.5.
pub fn meal_count_to_tenths(count: Decimal) -> Result<i64> {
    if count.is_sign_negative() && !count.is_zero() {
        return Err(Error::invalid(format!(
            "meal count {count} must not be negative"
        )));
    }
    if count > tenths_to_meals(MAX_MEAL_TENTHS) {
        return Err(Error::invalid(format!(
            "meal count {count} exceeds {}",
            tenths_to_meals(MAX_MEAL_TENTHS)
        )));
    }
    if !(count * Decimal::TWO).fract().is_zero() {
        return Err(Error::invalid(format!(
            "meal count {count} must be a multiple of 0.5"
        )));
    }

    to_minor_units(count, MEAL_SCALE)
}

/// Converts an expense amount to cents.
///
/// The amount must be non-negative with at most two fractional digits.
pub fn amount_to_cents(amount: Decimal) -> Result<i64> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::invalid(format!("amount {amount} must not be negative")));
    }
    if amount > cents_to_money(MAX_AMOUNT_CENTS) {
        return Err(Error::invalid(format!("amount {amount} is too large")));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(Error::invalid(format!(
            "amount {amount} has more than {MONEY_SCALE} decimal places"
        )));
    }

    to_minor_units(amount, MONEY_SCALE)
}

/// Tenths of a meal back to a meal count (`15` → `1.5`).
#[must_use]
pub fn tenths_to_meals(tenths: i64) -> Decimal {
    Decimal::new(tenths, MEAL_SCALE)
}

/// Cents back to money (`30000` → `300.00`).
#[must_use]
pub fn cents_to_money(cents: i64) -> Decimal {
    Decimal::new(cents, MONEY_SCALE)
}

/// Rounds to cents, half away from zero.
#[must_use]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounded money to cents. The value must already be on a cent boundary or it is
/// rounded first.
pub fn money_to_cents(value: Decimal) -> Result<i64> {
    to_minor_units(round_money(value), MONEY_SCALE)
}

/// `total_expense / total_meals` rounded to cents, or zero when nothing was eaten.
#[must_use]
pub fn meal_rate(total_expense: Decimal, total_meals: Decimal) -> Decimal {
    if total_meals <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    total_expense
        .checked_div(total_meals)
        .map_or(Decimal::ZERO, round_money)
}

fn to_minor_units(value: Decimal, scale: u32) -> Result<i64> {
    let mut scaled = value;
    scaled.rescale(scale);
    i64::try_from(scaled.mantissa())
        .map_err(|_| Error::invalid(format!("{value} does not fit the ledger")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_half_meals_are_exact() {
        assert_eq!(meal_count_to_tenths(dec!(1.5)).unwrap(), 15);
        assert_eq!(meal_count_to_tenths(dec!(0)).unwrap(), 0);
        assert_eq!(meal_count_to_tenths(dec!(2.50)).unwrap(), 25);
        assert_eq!(tenths_to_meals(15), dec!(1.5));
        assert_eq!(tenths_to_meals(15).to_string(), "1.5");
    }

    #[test]
    fn test_meal_count_validation() {
        assert!(matches!(
            meal_count_to_tenths(dec!(-1)),
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            meal_count_to_tenths(dec!(1.2)),
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            meal_count_to_tenths(dec!(1000)),
            Err(Error::InvalidInput { .. })
        ));
        assert_eq!(meal_count_to_tenths(dec!(999.5)).unwrap(), MAX_MEAL_TENTHS);
    }

    #[test]
    fn test_huge_values_are_rejected() {
        assert!(matches!(
            meal_count_to_tenths(Decimal::MAX),
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            amount_to_cents(Decimal::MAX),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_amount_validation() {
        assert_eq!(amount_to_cents(dec!(300.00)).unwrap(), 30_000);
        assert_eq!(amount_to_cents(dec!(12.5)).unwrap(), 1_250);
        assert_eq!(amount_to_cents(dec!(0)).unwrap(), 0);
        assert!(matches!(
            amount_to_cents(dec!(-0.01)),
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            amount_to_cents(dec!(1.005)),
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            amount_to_cents(dec!(10000000000)),
            Err(Error::InvalidInput { .. })
        ));
        // trailing zeros beyond cents are fine
        assert_eq!(amount_to_cents(dec!(4.2000)).unwrap(), 420);
    }

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec!(0.125)), dec!(0.13));
        assert_eq!(round_money(dec!(0.124)), dec!(0.12));
        assert_eq!(round_money(dec!(-0.125)), dec!(-0.13));
        assert_eq!(round_money(dec!(2.675)), dec!(2.68));
    }

    #[test]
    fn test_meal_rate() {
        assert_eq!(meal_rate(dec!(300.00), dec!(3)), dec!(100.00));
        assert_eq!(meal_rate(dec!(100.00), dec!(3)), dec!(33.33));
        assert_eq!(meal_rate(dec!(200.00), dec!(3)), dec!(66.67));
        assert_eq!(meal_rate(dec!(500.00), dec!(0)), Decimal::ZERO);
        assert_eq!(meal_rate(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_money_to_cents_rounds() {
        assert_eq!(money_to_cents(dec!(33.333)).unwrap(), 3_333);
        assert_eq!(money_to_cents(dec!(-100.005)).unwrap(), -10_001);
        assert_eq!(cents_to_money(-10_001), dec!(-100.01));
    }
}
