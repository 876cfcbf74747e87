//! Member roster - memberships and who is active in a given month.
//!
//! Memberships come from outside the ledger. This module reads them, resolves the
//! active members of a flat-month (membership flag plus the optional per-month
//! status override) and provides the few writes needed to seed and maintain them.

use crate::{
    core::period::MonthPeriod,
    entities::{MemberMonthStatus, Membership, member_month_status, membership},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*};
use std::collections::HashMap;

/// Requested per-month override for one membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthStatusUpdate {
    /// `false` removes the member from the month
    pub is_active: bool,
    /// First active day, must fall inside the month
    pub active_from: Option<NaiveDate>,
    /// Last active day, must fall inside the month
    pub active_until: Option<NaiveDate>,
    /// Free-text reason
    pub note: String,
}

/// Adds a member to a flat.
pub async fn add_member<C>(
    db: &C,
    flat_id: i64,
    user_id: &str,
    display_name: &str,
    role: &str,
) -> Result<membership::Model>
where
    C: ConnectionTrait,
{
    if display_name.trim().is_empty() {
        return Err(Error::invalid("Member name cannot be empty"));
    }

    let member = membership::ActiveModel {
        flat_id: Set(flat_id),
        user_id: Set(user_id.to_string()),
        display_name: Set(display_name.trim().to_string()),
        role: Set(role.to_string()),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    member.insert(db).await.map_err(Into::into)
}

/// Sets the membership-wide active flag.
pub async fn set_member_active<C>(
    db: &C,
    member: membership::Model,
    is_active: bool,
) -> Result<membership::Model>
where
    C: ConnectionTrait,
{
    let mut active_model: membership::ActiveModel = member.into();
    active_model.is_active = Set(is_active);
    active_model.update(db).await.map_err(Into::into)
}

/// Finds a membership of the given flat.
///
/// Memberships of other flats are reported as not found.
pub async fn find_member<C>(db: &C, flat_id: i64, member_id: i64) -> Result<membership::Model>
where
    C: ConnectionTrait,
{
    Membership::find_by_id(member_id)
        .filter(membership::Column::FlatId.eq(flat_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("member", member_id))
}

/// Finds the membership of a Discord user in a flat.
pub async fn find_member_by_user<C>(
    db: &C,
    flat_id: i64,
    user_id: &str,
) -> Result<Option<membership::Model>>
where
    C: ConnectionTrait,
{
    Membership::find()
        .filter(membership::Column::FlatId.eq(flat_id))
        .filter(membership::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Display names of every membership of a flat, active or not.
pub async fn member_names<C>(db: &C, flat_id: i64) -> Result<HashMap<i64, String>>
where
    C: ConnectionTrait,
{
    Ok(Membership::find()
        .filter(membership::Column::FlatId.eq(flat_id))
        .all(db)
        .await?
        .into_iter()
        .map(|member| (member.id, member.display_name))
        .collect())
}

/// All memberships of a flat with the active flag set, by display name.
pub async fn list_active_members<C>(db: &C, flat_id: i64) -> Result<Vec<membership::Model>>
where
    C: ConnectionTrait,
{
    Membership::find()
        .filter(membership::Column::FlatId.eq(flat_id))
        .filter(membership::Column::IsActive.eq(true))
        .order_by_asc(membership::Column::DisplayName)
        .order_by_asc(membership::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Members taking part in a month's split, ordered by display name then id.
pub async fn active_members_for_month<C>(
    db: &C,
    flat_id: i64,
    period: &MonthPeriod,
) -> Result<Vec<membership::Model>>
where
    C: ConnectionTrait,
{
    let members = list_active_members(db, flat_id).await?;

    let statuses: HashMap<i64, member_month_status::Model> = MemberMonthStatus::find()
        .filter(member_month_status::Column::FlatId.eq(flat_id))
        .filter(member_month_status::Column::Year.eq(period.year()))
        .filter(member_month_status::Column::Month.eq(period.db_month()))
        .all(db)
        .await?
        .into_iter()
        .map(|status| (status.membership_id, status))
        .collect();

    Ok(members
        .into_iter()
        .filter(|member| is_active_in(statuses.get(&member.id), period))
        .collect())
}

/// Whether a month status override leaves the member active in `period`.
///
/// No override means active. A window is active if it overlaps the month.
#[must_use]
pub fn is_active_in(status: Option<&member_month_status::Model>, period: &MonthPeriod) -> bool {
    let Some(status) = status else {
        return true;
    };
    if !status.is_active {
        return false;
    }

    let from = status.active_from.unwrap_or_else(|| period.first_day());
    let until = status.active_until.unwrap_or_else(|| period.last_day());
    from <= until && from <= period.last_day() && until >= period.first_day()
}

/// Creates or replaces the month status override of a member.
///
/// # Returns
/// The stored override and `true` if it was created.
pub async fn set_month_status<C>(
    db: &C,
    flat_id: i64,
    member_id: i64,
    period: &MonthPeriod,
    update: MonthStatusUpdate,
) -> Result<(member_month_status::Model, bool)>
where
    C: ConnectionTrait,
{
    for date in [update.active_from, update.active_until].into_iter().flatten() {
        if !period.contains(date) {
            return Err(Error::invalid(format!("{date} is outside {period}")));
        }
    }
    if let (Some(from), Some(until)) = (update.active_from, update.active_until) {
        if from > until {
            return Err(Error::invalid(format!(
                "active_from {from} is after active_until {until}"
            )));
        }
    }

    let member = find_member(db, flat_id, member_id).await?;
    let existing = MemberMonthStatus::find()
        .filter(member_month_status::Column::MembershipId.eq(member.id))
        .filter(member_month_status::Column::Year.eq(period.year()))
        .filter(member_month_status::Column::Month.eq(period.db_month()))
        .one(db)
        .await?;

    let now = Utc::now();
    if let Some(existing) = existing {
        let mut active_model: member_month_status::ActiveModel = existing.into();
        active_model.is_active = Set(update.is_active);
        active_model.active_from = Set(update.active_from);
        active_model.active_until = Set(update.active_until);
        active_model.note = Set(update.note);
        active_model.updated_at = Set(now);
        return Ok((active_model.update(db).await?, false));
    }

    let status = member_month_status::ActiveModel {
        membership_id: Set(member.id),
        flat_id: Set(flat_id),
        year: Set(period.year()),
        month: Set(period.db_month()),
        is_active: Set(update.is_active),
        active_from: Set(update.active_from),
        active_until: Set(update.active_until),
        note: Set(update.note),
        updated_at: Set(now),
        ..Default::default()
    };
    Ok((status.insert(db).await?, true))
}
