//! Resolution of the calling flat and member, plus argument parsing shared by
//! the commands.

use crate::{
    bot::Context,
    core::{auth::AuthContext, flat, members, period::MonthPeriod},
    entities::{flat as flat_entity, membership},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Longest text a single Discord message may carry, with room for code fences.
const MAX_BLOCK_CHARS: usize = 1_900;

/// The flat membership issuing a command.
#[derive(Debug, Clone)]
pub struct Actor {
    /// Flat bound to the guild
    pub flat: flat_entity::Model,
    /// Membership of the author
    pub member: membership::Model,
    /// Context passed to the gateway
    pub auth: AuthContext,
}

/// Resolves the guild to a flat and the author to a membership.
///
/// Replies with an explanation and returns `None` if either is missing.
pub async fn resolve_actor(ctx: Context<'_>) -> Result<Option<Actor>> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say("❌ This command only works inside a flat's server.")
            .await?;
        return Ok(None);
    };

    let db = ctx.data().gateway.db();
    let Some(flat) = flat::get_flat_by_guild(db, &guild_id.to_string()).await? else {
        ctx.say("❌ This server is not linked to a flat.").await?;
        return Ok(None);
    };

    let user_id = ctx.author().id.to_string();
    let Some(member) = members::find_member_by_user(db, flat.id, &user_id).await? else {
        ctx.say(format!("❌ You are not a member of {}.", flat.name))
            .await?;
        return Ok(None);
    };

    let auth = AuthContext::new(flat.id, member.id);
    Ok(Some(Actor { flat, member, auth }))
}

/// Finds a member of the actor's flat by display name, or the actor when no
/// name is given.
pub async fn resolve_member(
    ctx: Context<'_>,
    actor: &Actor,
    name: Option<&str>,
) -> Result<membership::Model> {
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(actor.member.clone());
    };

    let db = ctx.data().gateway.db();
    let names = members::member_names(db, actor.flat.id).await?;
    let member_id = names
        .into_iter()
        .find(|(_, display_name)| display_name.eq_ignore_ascii_case(name))
        .map(|(id, _)| id)
        .ok_or_else(|| Error::not_found("member", name))?;

    members::find_member(db, actor.flat.id, member_id).await
}

/// Parses a decimal argument such as `1.5` or `300.00`.
pub fn parse_decimal(value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim())
        .map_err(|_| Error::invalid(format!("`{value}` is not a number")))
}

/// Parses a `YYYY-MM-DD` argument, defaulting to today.
pub fn parse_date(value: Option<&str>) -> Result<NaiveDate> {
    value.map_or_else(
        || Ok(chrono::Local::now().date_naive()),
        |v| {
            NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d")
                .map_err(|_| Error::invalid(format!("`{v}` is not a date (YYYY-MM-DD)")))
        },
    )
}

/// Parses a `YYYY-MM` argument, defaulting to the current month.
pub fn parse_month(value: Option<&str>) -> Result<MonthPeriod> {
    value.map_or_else(
        || MonthPeriod::containing(chrono::Local::now().date_naive()),
        |v| MonthPeriod::from_str(v.trim()),
    )
}

/// Wraps text in a code block, cutting it to fit one message.
#[must_use]
pub fn code_block(text: &str) -> String {
    if text.chars().count() <= MAX_BLOCK_CHARS {
        return format!("```\n{text}```");
    }
    let cut: String = text.chars().take(MAX_BLOCK_CHARS).collect();
    format!("```\n{cut}\n...```")
}
