//! Membership entity - A user's participation in a flat.
//!
//! Memberships are managed outside the ledger (invitations, removal) and are read
//! here to resolve who takes part in a month's cost split. The `role` column is
//! mapped to a capability set by the configured role table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Membership database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "memberships")]
pub struct Model {
    /// Unique identifier for the membership
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Flat this membership belongs to
    pub flat_id: i64,
    /// Discord user ID of the member
    pub user_id: String,
    /// Name shown in grids and balance tables
    pub display_name: String,
    /// Role name, looked up in the configured role table (e.g. `"owner"`)
    pub role: String,
    /// Inactive members keep their history but are left out of balances
    pub is_active: bool,
    /// When the member joined the flat
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Membership and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each membership belongs to one flat
    #[sea_orm(
        belongs_to = "super::flat::Entity",
        from = "Column::FlatId",
        to = "super::flat::Column::Id"
    )]
    Flat,
    /// One membership has many meal entries
    #[sea_orm(has_many = "super::meal_entry::Entity")]
    MealEntries,
    /// One membership pays many expenses
    #[sea_orm(has_many = "super::expense_entry::Entity")]
    Expenses,
}

impl Related<super::flat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Flat.def()
    }
}

impl Related<super::meal_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MealEntries.def()
    }
}

impl Related<super::expense_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
