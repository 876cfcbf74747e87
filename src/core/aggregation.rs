//! Aggregation engine - recomputes a flat-month's totals and meal rate.
//!
//! `recalculate_month` is the only writer of the summary totals. It takes the
//! summary row lock first, reads both sums with single grouped-SUM queries inside
//! the same transaction, and leaves the lock columns alone.

use crate::{
    core::{amount, ledger, period::MonthPeriod, summary},
    entities::monthly_summary,
    errors::Result,
};
use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, TransactionTrait, prelude::*};
use tracing::debug;

/// Integer totals of one flat-month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthTotals {
    /// Sum of meal counts, in tenths
    pub total_meal_tenths: i64,
    /// Sum of expenses, in cents
    pub total_expense_cents: i64,
    /// Rounded rate per meal, in cents
    pub meal_rate_cents: i64,
}

impl MonthTotals {
    /// Derives the meal rate from the two sums.
    pub fn from_sums(total_meal_tenths: i64, total_expense_cents: i64) -> Result<Self> {
        let rate = amount::meal_rate(
            amount::cents_to_money(total_expense_cents),
            amount::tenths_to_meals(total_meal_tenths),
        );

        Ok(Self {
            total_meal_tenths,
            total_expense_cents,
            meal_rate_cents: amount::money_to_cents(rate)?,
        })
    }

    fn matches(&self, row: &monthly_summary::Model) -> bool {
        row.total_meal_tenths == self.total_meal_tenths
            && row.total_expense_cents == self.total_expense_cents
            && row.meal_rate_cents == self.meal_rate_cents
    }
}

/// Recomputes totals and meal rate for a flat-month and stores them.
///
/// Creates the summary row on first use. Lock state is preserved. Calling it again
/// without intervening writes leaves the row untouched, `updated_at` included.
///
/// Run this inside the transaction that applied the ledger write so the sums and
/// the write are seen together.
pub async fn recalculate_month<C>(
    db: &C,
    flat_id: i64,
    period: &MonthPeriod,
) -> Result<monthly_summary::Model>
where
    C: ConnectionTrait,
{
    let row = summary::lock_row(db, flat_id, period).await?;

    let total_meal_tenths = ledger::total_meal_tenths(db, flat_id, period).await?;
    let total_expense_cents = ledger::total_expense_cents(db, flat_id, period).await?;
    let totals = MonthTotals::from_sums(total_meal_tenths, total_expense_cents)?;

    if totals.matches(&row) {
        return Ok(row);
    }

    debug!(
        flat_id,
        %period,
        total_meal_tenths,
        total_expense_cents,
        meal_rate_cents = totals.meal_rate_cents,
        "Storing recalculated month totals"
    );

    let mut active_model: monthly_summary::ActiveModel = row.into();
    active_model.total_meal_tenths = Set(totals.total_meal_tenths);
    active_model.total_expense_cents = Set(totals.total_expense_cents);
    active_model.meal_rate_cents = Set(totals.meal_rate_cents);
    active_model.updated_at = Set(Utc::now());
    active_model.update(db).await.map_err(Into::into)
}

/// Recalculates a flat-month in its own transaction.
pub async fn recalculate_month_atomic(
    db: &DatabaseConnection,
    flat_id: i64,
    period: &MonthPeriod,
) -> Result<summary::MonthSummary> {
    let txn = db.begin().await?;
    let row = recalculate_month(&txn, flat_id, period).await?;
    txn.commit().await?;

    Ok(summary::MonthSummary::from_row(&row, period))
}
