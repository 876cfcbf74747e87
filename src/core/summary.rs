//! Monthly summary cache - per flat-month totals, meal rate and lock state.
//!
//! A flat-month moves through three states:
//!
//! * **uninitialized** - no row; reads return a zeroed [`MonthSummary`]
//! * **open** - row exists with `is_locked = false`
//! * **locked** - row exists with `is_locked = true`; ledger writes are rejected
//!
//! The row is also the serialization point for concurrent writers of the same
//! flat-month: [`lock_row`] creates it if needed and re-reads it with
//! `SELECT .. FOR UPDATE` inside the caller's transaction.

use crate::{
    core::{amount, period::MonthPeriod},
    entities::{MonthlySummary, monthly_summary},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{QuerySelect, Set, prelude::*, sea_query::OnConflict};
use serde::Serialize;

/// Lifecycle state of a flat-month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthState {
    /// No summary row exists yet
    Uninitialized,
    /// Accepting ledger writes
    Open,
    /// Closed for ledger writes until unlocked
    Locked,
}

/// Decimal view of a summary row, as handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthSummary {
    /// Flat the summary belongs to
    pub flat_id: i64,
    /// Calendar year
    pub year: i32,
    /// Month number, 1-12
    pub month: u32,
    /// Sum of all meal counts (1 decimal place)
    pub total_meals: Decimal,
    /// Sum of all expenses (2 decimal places)
    pub total_expense: Decimal,
    /// Cost of one meal (2 decimal places)
    pub meal_rate: Decimal,
    /// Whether ledger writes are rejected
    pub is_locked: bool,
    /// Membership that locked the month
    pub locked_by: Option<i64>,
    /// When the month was locked
    pub locked_at: Option<DateTime<Utc>>,
}

impl MonthSummary {
    /// Zeroed summary of a month that has never been calculated.
    #[must_use]
    pub const fn empty(flat_id: i64, period: &MonthPeriod) -> Self {
        Self {
            flat_id,
            year: period.year(),
            month: period.month(),
            total_meals: Decimal::ZERO,
            total_expense: Decimal::ZERO,
            meal_rate: Decimal::ZERO,
            is_locked: false,
            locked_by: None,
            locked_at: None,
        }
    }

    /// Converts a stored row. The period is passed in because it was validated
    /// when the row was looked up.
    #[must_use]
    pub fn from_row(row: &monthly_summary::Model, period: &MonthPeriod) -> Self {
        Self {
            flat_id: row.flat_id,
            year: period.year(),
            month: period.month(),
            total_meals: amount::tenths_to_meals(row.total_meal_tenths),
            total_expense: amount::cents_to_money(row.total_expense_cents),
            meal_rate: amount::cents_to_money(row.meal_rate_cents),
            is_locked: row.is_locked,
            locked_by: row.locked_by,
            locked_at: row.locked_at,
        }
    }
}

/// Reads the stored summary row without creating it.
pub async fn find_row<C>(
    db: &C,
    flat_id: i64,
    period: &MonthPeriod,
) -> Result<Option<monthly_summary::Model>>
where
    C: ConnectionTrait,
{
    MonthlySummary::find()
        .filter(monthly_summary::Column::FlatId.eq(flat_id))
        .filter(monthly_summary::Column::Year.eq(period.year()))
        .filter(monthly_summary::Column::Month.eq(period.db_month()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Reads the cached summary. An uninitialized month reads as all zeros and unlocked.
pub async fn get_summary<C>(db: &C, flat_id: i64, period: &MonthPeriod) -> Result<MonthSummary>
where
    C: ConnectionTrait,
{
    let row = find_row(db, flat_id, period).await?;
    Ok(row.map_or_else(
        || MonthSummary::empty(flat_id, period),
        |row| MonthSummary::from_row(&row, period),
    ))
}

/// Current lifecycle state of a flat-month.
pub async fn month_state<C>(db: &C, flat_id: i64, period: &MonthPeriod) -> Result<MonthState>
where
    C: ConnectionTrait,
{
    Ok(match find_row(db, flat_id, period).await? {
        None => MonthState::Uninitialized,
        Some(row) if row.is_locked => MonthState::Locked,
        Some(_) => MonthState::Open,
    })
}

/// Whether writes to the flat-month are currently rejected.
pub async fn is_month_locked<C>(db: &C, flat_id: i64, period: &MonthPeriod) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(month_state(db, flat_id, period).await? == MonthState::Locked)
}

/// Creates the summary row if missing, then re-reads it with an exclusive row lock.
///
/// Must be called inside a transaction; the lock is held until it ends. Concurrent
/// writers of the same flat-month queue here while other months proceed.
pub async fn lock_row<C>(
    db: &C,
    flat_id: i64,
    period: &MonthPeriod,
) -> Result<monthly_summary::Model>
where
    C: ConnectionTrait,
{
    let blank = monthly_summary::ActiveModel {
        flat_id: Set(flat_id),
        year: Set(period.year()),
        month: Set(period.db_month()),
        total_meal_tenths: Set(0),
        total_expense_cents: Set(0),
        meal_rate_cents: Set(0),
        is_locked: Set(false),
        locked_by: Set(None),
        locked_at: Set(None),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    MonthlySummary::insert(blank)
        .on_conflict(
            OnConflict::columns([
                monthly_summary::Column::FlatId,
                monthly_summary::Column::Year,
                monthly_summary::Column::Month,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    MonthlySummary::find()
        .filter(monthly_summary::Column::FlatId.eq(flat_id))
        .filter(monthly_summary::Column::Year.eq(period.year()))
        .filter(monthly_summary::Column::Month.eq(period.db_month()))
        .lock_exclusive()
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("monthly summary", format!("{flat_id}/{period}")))
}

/// Fails with [`Error::MonthLocked`] if the (row-locked) summary is locked.
pub fn ensure_open(row: &monthly_summary::Model, period: &MonthPeriod) -> Result<()> {
    if row.is_locked {
        return Err(Error::MonthLocked {
            year: period.year(),
            month: period.month(),
        });
    }
    Ok(())
}

/// Marks the row locked by `actor_id`. Locking a locked month re-stamps it.
/// Totals are left untouched.
pub async fn set_locked<C>(
    db: &C,
    row: monthly_summary::Model,
    actor_id: i64,
) -> Result<monthly_summary::Model>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let mut active_model: monthly_summary::ActiveModel = row.into();
    active_model.is_locked = Set(true);
    active_model.locked_by = Set(Some(actor_id));
    active_model.locked_at = Set(Some(now));
    active_model.updated_at = Set(now);
    active_model.update(db).await.map_err(Into::into)
}

/// Clears the lock columns. Totals are left untouched.
pub async fn set_unlocked<C>(
    db: &C,
    row: monthly_summary::Model,
) -> Result<monthly_summary::Model>
where
    C: ConnectionTrait,
{
    let mut active_model: monthly_summary::ActiveModel = row.into();
    active_model.is_locked = Set(false);
    active_model.locked_by = Set(None);
    active_model.locked_at = Set(None);
    active_model.updated_at = Set(Utc::now());
    active_model.update(db).await.map_err(Into::into)
}
