//! Autocomplete handlers for Discord slash command parameters.
//!
//! Suggests member display names of the flat bound to the current guild.

use crate::{
    bot::Context,
    core::{flat, members},
};

/// Discord shows at most this many suggestions.
const MAX_SUGGESTIONS: usize = 25;

/// Provides autocomplete suggestions for member display names.
///
/// Only active members of the guild's flat are suggested, matched
/// case-insensitively anywhere in the name. Lookup failures yield no
/// suggestions rather than an error.
pub async fn autocomplete_member_name(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let Some(guild_id) = ctx.guild_id() else {
        return Vec::new();
    };
    let db = ctx.data().gateway.db();

    let Ok(Some(flat)) = flat::get_flat_by_guild(db, &guild_id.to_string()).await else {
        return Vec::new();
    };
    let Ok(roster) = members::list_active_members(db, flat.id).await else {
        return Vec::new();
    };

    let partial_lower = partial.to_lowercase();
    let mut matching: Vec<String> = roster
        .into_iter()
        .filter(|m| m.display_name.to_lowercase().contains(&partial_lower))
        .map(|m| m.display_name)
        .take(MAX_SUGGESTIONS)
        .collect();

    matching.sort();
    matching
}
