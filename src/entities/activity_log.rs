//! Activity log entity - Append-only record of who changed what in a flat.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Activity log database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub flat_id: i64,
    /// Membership that performed the action
    pub actor_id: i64,
    /// Action code, e.g. `"meal_add"` or `"month_lock"`
    pub action: String,
    pub description: String,
    /// Structured details of the change
    pub metadata: Json,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
