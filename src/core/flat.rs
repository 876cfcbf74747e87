//! Flat lookups and creation.

use crate::{
    entities::{Flat, flat},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};

/// Creates a flat bound to a Discord guild.
pub async fn create_flat<C>(db: &C, name: &str, guild_id: &str) -> Result<flat::Model>
where
    C: ConnectionTrait,
{
    if name.trim().is_empty() {
        return Err(Error::invalid("Flat name cannot be empty"));
    }

    let flat = flat::ActiveModel {
        name: Set(name.trim().to_string()),
        guild_id: Set(guild_id.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    flat.insert(db).await.map_err(Into::into)
}

/// Finds the flat managed from a guild.
pub async fn get_flat_by_guild<C>(db: &C, guild_id: &str) -> Result<Option<flat::Model>>
where
    C: ConnectionTrait,
{
    Flat::find()
        .filter(flat::Column::GuildId.eq(guild_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a flat by id.
pub async fn get_flat<C>(db: &C, flat_id: i64) -> Result<flat::Model>
where
    C: ConnectionTrait,
{
    Flat::find_by_id(flat_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("flat", flat_id))
}
