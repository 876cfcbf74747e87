//! Member month status entity - Per-month activity override for a membership.
//!
//! No row means the member is active for the whole month. A row can switch the
//! member off for the month or narrow the active window with `active_from` /
//! `active_until`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Member month status database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "member_month_statuses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub membership_id: i64,
    pub flat_id: i64,
    pub year: i32,
    /// Month number, 1-12
    pub month: i32,
    /// `false` takes the member out of the month entirely
    pub is_active: bool,
    /// First active day within the month, if narrowed
    pub active_from: Option<Date>,
    /// Last active day within the month, if narrowed
    pub active_until: Option<Date>,
    pub note: String,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::membership::Entity",
        from = "Column::MembershipId",
        to = "super::membership::Column::Id"
    )]
    Membership,
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Membership.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
