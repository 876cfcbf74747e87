//! Meal Discord command - `meal`.
//!
//! Writes one meal cell through the gateway and replies with the refreshed
//! month totals.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{Context, context, handlers::autocomplete},
        core::{gateway::MealCellInput, report},
        errors::Result,
    };

    /// Sets the number of meals a member ate on a day.
    ///
    /// A second call for the same member and day replaces the count; set it to 0
    /// to clear the cell.
    #[poise::command(slash_command, guild_only)]
    pub async fn meal(
        ctx: Context<'_>,
        #[description = "Meals eaten, in steps of 0.5 (e.g. 1.5)"] count: String,
        #[description = "Date as YYYY-MM-DD (defaults to today)"] date: Option<String>,
        #[description = "Member (defaults to you)"]
        #[autocomplete = "autocomplete::autocomplete_member_name"]
        member: Option<String>,
    ) -> Result<()> {
        let Some(actor) = context::resolve_actor(ctx).await? else {
            return Ok(());
        };
        let target = context::resolve_member(ctx, &actor, member.as_deref()).await?;

        let input = MealCellInput {
            member_id: target.id,
            date: context::parse_date(date.as_deref())?,
            meal_count: context::parse_decimal(&count)?,
        };
        let update = ctx.data().gateway.upsert_meal_cell(actor.auth, input).await?;

        ctx.say(format!(
            "✅ {} meals for {} on {}\n{}",
            report::format_meals(update.entry.meal_count),
            update.entry.member_name,
            update.entry.date,
            report::format_summary_line(&update.summary),
        ))
        .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
