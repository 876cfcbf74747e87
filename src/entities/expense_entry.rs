//! Expense entry entity - A single shared-cost contribution paid by one member.
//!
//! Amounts are stored in cents. The entry's own `date` decides which month it is
//! accounted to.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Expense entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expense_entries")]
pub struct Model {
    /// Unique identifier for the expense
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Flat the expense was made for
    pub flat_id: i64,
    /// Membership that paid
    pub payer_id: i64,
    /// Amount paid, in cents
    pub amount_cents: i64,
    /// Free-text description (e.g. "Rice and lentils")
    pub description: String,
    /// Date the expense is accounted to
    pub date: Date,
    /// When the expense was recorded
    pub created_at: DateTimeUtc,
    /// When the expense was last edited
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `ExpenseEntry` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each expense is paid by one membership
    #[sea_orm(
        belongs_to = "super::membership::Entity",
        from = "Column::PayerId",
        to = "super::membership::Column::Id"
    )]
    Payer,
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
