//! Monthly summary entity - Cached aggregate of one flat-month plus its lock state.
//!
//! The totals and rate are derived from meal and expense rows and are only ever
//! written by recalculation. The lock columns are only written by lock/unlock.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Monthly summary database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monthly_summaries")]
pub struct Model {
    /// Unique identifier for the summary row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Flat the summary belongs to
    pub flat_id: i64,
    /// Calendar year
    pub year: i32,
    /// Month number, 1-12
    pub month: i32,
    /// Sum of meal counts, in tenths
    pub total_meal_tenths: i64,
    /// Sum of expense amounts, in cents
    pub total_expense_cents: i64,
    /// `total_expense / total_meals`, rounded to cents
    pub meal_rate_cents: i64,
    /// Whether meal (and, by policy, expense) writes are rejected
    pub is_locked: bool,
    /// Membership that locked the month
    pub locked_by: Option<i64>,
    /// When the month was locked
    pub locked_at: Option<DateTimeUtc>,
    /// When the totals or lock state last changed
    pub updated_at: DateTimeUtc,
}

/// `MonthlySummary` is keyed by flat only; it has no navigable relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
