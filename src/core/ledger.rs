//! Ledger store - raw meal and expense facts scoped by flat and date.
//!
//! This module only reads and writes rows. It never recalculates summaries; the
//! mutation gateway is responsible for that. Every function takes any
//! [`ConnectionTrait`] so it can run inside the caller's transaction.

use crate::{
    core::period::MonthPeriod,
    entities::{ExpenseEntry, MealEntry, expense_entry, meal_entry},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*, sea_query::Expr};
use std::collections::HashMap;

/// Column values of an expense, as written by create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseFields {
    /// Membership that paid
    pub payer_id: i64,
    /// Amount in cents
    pub amount_cents: i64,
    /// Free-text description
    pub description: String,
    /// Date the expense is accounted to
    pub date: NaiveDate,
}

/// Writes a meal cell. A second write to the same `(flat, member, date)` updates
/// the existing row.
///
/// # Returns
/// The stored entry and `true` if the row was created rather than updated.
pub async fn upsert_meal<C>(
    db: &C,
    flat_id: i64,
    member_id: i64,
    date: NaiveDate,
    meal_tenths: i64,
) -> Result<(meal_entry::Model, bool)>
where
    C: ConnectionTrait,
{
    let now = Utc::now();

    if let Some(existing) = find_meal(db, flat_id, member_id, date).await? {
        let mut active_model: meal_entry::ActiveModel = existing.into();
        active_model.meal_tenths = Set(meal_tenths);
        active_model.updated_at = Set(now);
        let updated = active_model.update(db).await?;
        return Ok((updated, false));
    }

    let entry = meal_entry::ActiveModel {
        flat_id: Set(flat_id),
        member_id: Set(member_id),
        date: Set(date),
        meal_tenths: Set(meal_tenths),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let inserted = entry.insert(db).await?;
    Ok((inserted, true))
}

/// Looks up a single meal cell.
pub async fn find_meal<C>(
    db: &C,
    flat_id: i64,
    member_id: i64,
    date: NaiveDate,
) -> Result<Option<meal_entry::Model>>
where
    C: ConnectionTrait,
{
    MealEntry::find()
        .filter(meal_entry::Column::FlatId.eq(flat_id))
        .filter(meal_entry::Column::MemberId.eq(member_id))
        .filter(meal_entry::Column::Date.eq(date))
        .one(db)
        .await
        .map_err(Into::into)
}

/// All meal cells of a flat-month, ordered by date then member.
pub async fn meals_in_period<C>(
    db: &C,
    flat_id: i64,
    period: &MonthPeriod,
) -> Result<Vec<meal_entry::Model>>
where
    C: ConnectionTrait,
{
    MealEntry::find()
        .filter(meal_entry::Column::FlatId.eq(flat_id))
        .filter(meal_entry::Column::Date.between(period.first_day(), period.last_day()))
        .order_by_asc(meal_entry::Column::Date)
        .order_by_asc(meal_entry::Column::MemberId)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sum of meal tenths over a flat-month, 0 if there are no rows.
pub async fn total_meal_tenths<C>(db: &C, flat_id: i64, period: &MonthPeriod) -> Result<i64>
where
    C: ConnectionTrait,
{
    let total: Option<Option<i64>> = MealEntry::find()
        .select_only()
        .column_as(Expr::col(meal_entry::Column::MealTenths).sum(), "total")
        .filter(meal_entry::Column::FlatId.eq(flat_id))
        .filter(meal_entry::Column::Date.between(period.first_day(), period.last_day()))
        .into_tuple()
        .one(db)
        .await?;

    Ok(total.flatten().unwrap_or(0))
}

/// Meal tenths per member over a flat-month. Members without rows are absent.
pub async fn meal_tenths_by_member<C>(
    db: &C,
    flat_id: i64,
    period: &MonthPeriod,
) -> Result<HashMap<i64, i64>>
where
    C: ConnectionTrait,
{
    let rows: Vec<(i64, Option<i64>)> = MealEntry::find()
        .select_only()
        .column(meal_entry::Column::MemberId)
        .column_as(Expr::col(meal_entry::Column::MealTenths).sum(), "total")
        .filter(meal_entry::Column::FlatId.eq(flat_id))
        .filter(meal_entry::Column::Date.between(period.first_day(), period.last_day()))
        .group_by(meal_entry::Column::MemberId)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(member_id, total)| (member_id, total.unwrap_or(0)))
        .collect())
}

/// Inserts a new expense.
pub async fn insert_expense<C>(
    db: &C,
    flat_id: i64,
    fields: ExpenseFields,
) -> Result<expense_entry::Model>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let expense = expense_entry::ActiveModel {
        flat_id: Set(flat_id),
        payer_id: Set(fields.payer_id),
        amount_cents: Set(fields.amount_cents),
        description: Set(fields.description),
        date: Set(fields.date),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    expense.insert(db).await.map_err(Into::into)
}

/// Overwrites every editable column of an existing expense.
pub async fn update_expense<C>(
    db: &C,
    existing: expense_entry::Model,
    fields: ExpenseFields,
) -> Result<expense_entry::Model>
where
    C: ConnectionTrait,
{
    let mut active_model: expense_entry::ActiveModel = existing.into();
    active_model.payer_id = Set(fields.payer_id);
    active_model.amount_cents = Set(fields.amount_cents);
    active_model.description = Set(fields.description);
    active_model.date = Set(fields.date);
    active_model.updated_at = Set(Utc::now());

    active_model.update(db).await.map_err(Into::into)
}

/// Deletes an expense by id.
pub async fn delete_expense<C>(db: &C, expense_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = ExpenseEntry::delete_by_id(expense_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("expense", expense_id));
    }
    Ok(())
}

/// Finds an expense within a flat. Expenses of other flats are invisible.
pub async fn find_expense<C>(
    db: &C,
    flat_id: i64,
    expense_id: i64,
) -> Result<Option<expense_entry::Model>>
where
    C: ConnectionTrait,
{
    ExpenseEntry::find_by_id(expense_id)
        .filter(expense_entry::Column::FlatId.eq(flat_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// All expenses of a flat-month, newest date first.
pub async fn expenses_in_period<C>(
    db: &C,
    flat_id: i64,
    period: &MonthPeriod,
) -> Result<Vec<expense_entry::Model>>
where
    C: ConnectionTrait,
{
    ExpenseEntry::find()
        .filter(expense_entry::Column::FlatId.eq(flat_id))
        .filter(expense_entry::Column::Date.between(period.first_day(), period.last_day()))
        .order_by_desc(expense_entry::Column::Date)
        .order_by_desc(expense_entry::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sum of expense cents over a flat-month, 0 if there are no rows.
pub async fn total_expense_cents<C>(db: &C, flat_id: i64, period: &MonthPeriod) -> Result<i64>
where
    C: ConnectionTrait,
{
    let total: Option<Option<i64>> = ExpenseEntry::find()
        .select_only()
        .column_as(Expr::col(expense_entry::Column::AmountCents).sum(), "total")
        .filter(expense_entry::Column::FlatId.eq(flat_id))
        .filter(expense_entry::Column::Date.between(period.first_day(), period.last_day()))
        .into_tuple()
        .one(db)
        .await?;

    Ok(total.flatten().unwrap_or(0))
}

/// Cents paid per member over a flat-month. Members without rows are absent.
pub async fn paid_cents_by_member<C>(
    db: &C,
    flat_id: i64,
    period: &MonthPeriod,
) -> Result<HashMap<i64, i64>>
where
    C: ConnectionTrait,
{
    let rows: Vec<(i64, Option<i64>)> = ExpenseEntry::find()
        .select_only()
        .column(expense_entry::Column::PayerId)
        .column_as(Expr::col(expense_entry::Column::AmountCents).sum(), "total")
        .filter(expense_entry::Column::FlatId.eq(flat_id))
        .filter(expense_entry::Column::Date.between(period.first_day(), period.last_day()))
        .group_by(expense_entry::Column::PayerId)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(payer_id, total)| (payer_id, total.unwrap_or(0)))
        .collect())
}
