//! Balance calculator - per-member cost and net position for a month.
//!
//! A positive balance means the household owes the member; negative means the
//! member owes the household.

use crate::{
    core::{aggregation, amount, ledger, members, period::MonthPeriod},
    entities::membership,
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::ConnectionTrait;
use serde::Serialize;
use std::collections::HashMap;

/// Net position of one member in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberBalance {
    /// Membership id
    pub member_id: i64,
    /// Display name
    pub name: String,
    /// Meals eaten in the month
    pub total_meals: Decimal,
    /// Expenses paid in the month
    pub total_paid: Decimal,
    /// `total_meals * meal_rate`, rounded to cents
    pub individual_cost: Decimal,
    /// `total_paid - individual_cost`, rounded to cents
    pub balance: Decimal,
}

/// Computes balances for `active_members` at a given meal rate.
///
/// Every member in the slice gets an entry, including those without meals or
/// payments. Output order follows the slice.
#[must_use]
pub fn compute_balances(
    meal_rate: Decimal,
    active_members: &[membership::Model],
    meal_tenths: &HashMap<i64, i64>,
    paid_cents: &HashMap<i64, i64>,
) -> Vec<MemberBalance> {
    active_members
        .iter()
        .map(|member| {
            let total_meals =
                amount::tenths_to_meals(meal_tenths.get(&member.id).copied().unwrap_or(0));
            let total_paid =
                amount::cents_to_money(paid_cents.get(&member.id).copied().unwrap_or(0));
            let individual_cost = amount::round_money(total_meals * meal_rate);
            let balance = amount::round_money(total_paid - individual_cost);

            MemberBalance {
                member_id: member.id,
                name: member.display_name.clone(),
                total_meals,
                total_paid,
                individual_cost,
                balance,
            }
        })
        .collect()
}

/// Balances of the month's active members at an already computed rate.
pub async fn balances_at_rate<C>(
    db: &C,
    flat_id: i64,
    period: &MonthPeriod,
    meal_rate: Decimal,
) -> Result<Vec<MemberBalance>>
where
    C: ConnectionTrait,
{
    let active = members::active_members_for_month(db, flat_id, period).await?;
    let meals = ledger::meal_tenths_by_member(db, flat_id, period).await?;
    let paid = ledger::paid_cents_by_member(db, flat_id, period).await?;

    Ok(compute_balances(meal_rate, &active, &meals, &paid))
}

/// Recalculates the month, then computes every active member's balance against
/// the fresh rate.
pub async fn get_user_balances<C>(
    db: &C,
    flat_id: i64,
    period: &MonthPeriod,
) -> Result<Vec<MemberBalance>>
where
    C: ConnectionTrait,
{
    let row = aggregation::recalculate_month(db, flat_id, period).await?;
    balances_at_rate(db, flat_id, period, amount::cents_to_money(row.meal_rate_cents)).await
}
