//! Activity log - append-only record of successful mutations.

use crate::{
    core::auth::AuthContext,
    entities::{ActivityLog, activity_log},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use serde_json::Value;

/// Kind of mutation recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityAction {
    /// Meal cell created
    MealAdd,
    /// Meal cell changed
    MealUpdate,
    /// Expense recorded
    ExpenseAdd,
    /// Expense changed
    ExpenseUpdate,
    /// Expense removed
    ExpenseDelete,
    /// Month locked
    MonthLock,
    /// Month unlocked
    MonthUnlock,
    /// Member month status changed
    MemberStatus,
}

impl ActivityAction {
    /// Code stored in the `action` column.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MealAdd => "meal_add",
            Self::MealUpdate => "meal_update",
            Self::ExpenseAdd => "expense_add",
            Self::ExpenseUpdate => "expense_update",
            Self::ExpenseDelete => "expense_delete",
            Self::MonthLock => "month_lock",
            Self::MonthUnlock => "month_unlock",
            Self::MemberStatus => "member_status",
        }
    }
}

/// Appends an activity row for the actor of `ctx`.
pub async fn record<C>(
    db: &C,
    ctx: &AuthContext,
    action: ActivityAction,
    description: impl Into<String>,
    metadata: Value,
) -> Result<activity_log::Model>
where
    C: ConnectionTrait,
{
    let entry = activity_log::ActiveModel {
        flat_id: Set(ctx.flat_id),
        actor_id: Set(ctx.actor_id),
        action: Set(action.code().to_string()),
        description: Set(description.into()),
        metadata: Set(metadata),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    entry.insert(db).await.map_err(Into::into)
}

/// Most recent activity of a flat, newest first.
pub async fn recent_activity<C>(
    db: &C,
    flat_id: i64,
    limit: u64,
) -> Result<Vec<activity_log::Model>>
where
    C: ConnectionTrait,
{
    ActivityLog::find()
        .filter(activity_log::Column::FlatId.eq(flat_id))
        .order_by_desc(activity_log::Column::CreatedAt)
        .order_by_desc(activity_log::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}
