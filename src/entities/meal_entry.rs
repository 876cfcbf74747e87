//! Meal entry entity - One member's meal count for one date in one flat.
//!
//! `(flat_id, member_id, date)` is unique: writing the same cell again updates the
//! row. Counts are stored in tenths of a meal so half meals round-trip exactly.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Meal entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meal_entries")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Flat the meal was eaten in
    pub flat_id: i64,
    /// Membership that ate the meals
    pub member_id: i64,
    /// Calendar date of the cell
    pub date: Date,
    /// Meal count in tenths (`15` = 1.5 meals)
    pub meal_tenths: i64,
    /// When the cell was first written
    pub created_at: DateTimeUtc,
    /// When the cell was last written
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `MealEntry` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one membership
    #[sea_orm(
        belongs_to = "super::membership::Entity",
        from = "Column::MemberId",
        to = "super::membership::Column::Id"
    )]
    Member,
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Member.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
