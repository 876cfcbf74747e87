//! Flat entity - A household whose members share meals and expenses.
//!
//! Flats are the tenant boundary: every ledger row, summary and membership
//! carries a `flat_id`. A flat is bound to the Discord guild it is managed from.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Flat database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "flats")]
pub struct Model {
    /// Unique identifier for the flat
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable name (e.g., "Flat 4B")
    pub name: String,
    /// Discord guild the flat is managed from
    #[sea_orm(unique)]
    pub guild_id: String,
    /// When the flat was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Flat and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One flat has many memberships
    #[sea_orm(has_many = "super::membership::Entity")]
    Memberships,
}

impl Related<super::membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
