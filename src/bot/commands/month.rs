//! Month Discord commands - `month summary|grid|lock|unlock|status|activity`.
//!
//! Month-level reads and the lock lifecycle. Every read goes through the gateway
//! so the numbers shown are recalculated from the ledger first.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{Context, context, handlers::autocomplete},
        core::{members::MonthStatusUpdate, report},
        errors::Result,
    };
    use poise::serenity_prelude as serenity;
    use std::fmt::Write;

    const DEFAULT_ACTIVITY_LIMIT: u64 = 10;
    const MAX_ACTIVITY_LIMIT: u64 = 50;

    /// Parent command for month reports and closing.
    #[poise::command(
        slash_command,
        guild_only,
        subcommands(
            "month_summary",
            "month_grid",
            "month_lock",
            "month_unlock",
            "month_status",
            "month_activity"
        )
    )]
    pub async fn month(ctx: Context<'_>) -> Result<()> {
        let help_text = "Month command. Available subcommands:\n\
            `/month summary` - Totals, meal rate and balances\n\
            `/month grid` - Meals per day and member\n\
            `/month lock` / `/month unlock` - Close or reopen a month\n\
            `/month status` - Set who takes part in a month\n\
            `/month activity` - Recent changes";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Shows the month's totals, meal rate and every member's balance.
    #[poise::command(slash_command, guild_only, rename = "summary")]
    pub async fn month_summary(
        ctx: Context<'_>,
        #[description = "Month as YYYY-MM (defaults to this month)"] month: Option<String>,
    ) -> Result<()> {
        let Some(actor) = context::resolve_actor(ctx).await? else {
            return Ok(());
        };
        let period = context::parse_month(month.as_deref())?;
        let month_report = ctx
            .data()
            .gateway
            .month_summary(actor.auth, period.year(), period.month())
            .await?;

        let lock_state = if month_report.summary.is_locked {
            "🔒 Locked"
        } else {
            "🔓 Open"
        };
        let embed = serenity::CreateEmbed::default()
            .title(format!("**{} - {period}**", actor.flat.name))
            .description(context::code_block(&report::format_month_report(
                &month_report,
            )?))
            .color(0x0034_98DB)
            .footer(serenity::CreateEmbedFooter::new(lock_state));

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Shows the meal grid of a month.
    #[poise::command(slash_command, guild_only, rename = "grid")]
    pub async fn month_grid(
        ctx: Context<'_>,
        #[description = "Month as YYYY-MM (defaults to this month)"] month: Option<String>,
    ) -> Result<()> {
        let Some(actor) = context::resolve_actor(ctx).await? else {
            return Ok(());
        };
        let period = context::parse_month(month.as_deref())?;
        let view = ctx
            .data()
            .gateway
            .month_grid(actor.auth, period.year(), period.month())
            .await?;

        if view.meals.is_empty() {
            ctx.say(format!("📭 No meals recorded for {period}.")).await?;
            return Ok(());
        }

        ctx.say(context::code_block(&report::format_meal_grid(&view)?))
            .await?;
        Ok(())
    }

    /// Closes a month: recalculates it and rejects further edits.
    #[poise::command(slash_command, guild_only, rename = "lock")]
    pub async fn month_lock(
        ctx: Context<'_>,
        #[description = "Month as YYYY-MM (defaults to this month)"] month: Option<String>,
    ) -> Result<()> {
        let Some(actor) = context::resolve_actor(ctx).await? else {
            return Ok(());
        };
        let period = context::parse_month(month.as_deref())?;
        let summary = ctx
            .data()
            .gateway
            .lock_month(actor.auth, period.year(), period.month())
            .await?;

        ctx.say(format!(
            "🔒 {period} is locked.\n{}",
            report::format_summary_line(&summary)
        ))
        .await?;
        Ok(())
    }

    /// Reopens a locked month.
    #[poise::command(slash_command, guild_only, rename = "unlock")]
    pub async fn month_unlock(
        ctx: Context<'_>,
        #[description = "Month as YYYY-MM (defaults to this month)"] month: Option<String>,
    ) -> Result<()> {
        let Some(actor) = context::resolve_actor(ctx).await? else {
            return Ok(());
        };
        let period = context::parse_month(month.as_deref())?;
        ctx.data()
            .gateway
            .unlock_month(actor.auth, period.year(), period.month())
            .await?;

        ctx.say(format!("🔓 {period} is open for edits.")).await?;
        Ok(())
    }

    /// Sets whether a member takes part in a month, optionally for part of it.
    #[poise::command(slash_command, guild_only, rename = "status")]
    pub async fn month_status(
        ctx: Context<'_>,
        #[description = "Member"]
        #[autocomplete = "autocomplete::autocomplete_member_name"]
        member: String,
        #[description = "Whether the member takes part"] active: bool,
        #[description = "First active day as YYYY-MM-DD"] from: Option<String>,
        #[description = "Last active day as YYYY-MM-DD"] until: Option<String>,
        #[description = "Reason"] note: Option<String>,
        #[description = "Month as YYYY-MM (defaults to this month)"] month: Option<String>,
    ) -> Result<()> {
        let Some(actor) = context::resolve_actor(ctx).await? else {
            return Ok(());
        };
        let target = context::resolve_member(ctx, &actor, Some(member.as_str())).await?;
        let period = context::parse_month(month.as_deref())?;

        let update = MonthStatusUpdate {
            is_active: active,
            active_from: from
                .as_deref()
                .map(|v| context::parse_date(Some(v)))
                .transpose()?,
            active_until: until
                .as_deref()
                .map(|v| context::parse_date(Some(v)))
                .transpose()?,
            note: note.unwrap_or_default(),
        };
        let status = ctx
            .data()
            .gateway
            .set_member_month_status(actor.auth, target.id, period.year(), period.month(), update)
            .await?;

        let mut reply = format!(
            "✅ {} is {} in {period}",
            target.display_name,
            if status.is_active { "active" } else { "inactive" }
        );
        match (status.active_from, status.active_until) {
            (Some(start), Some(end)) => write!(reply, " from {start} until {end}")?,
            (Some(start), None) => write!(reply, " from {start}")?,
            (None, Some(end)) => write!(reply, " until {end}")?,
            (None, None) => {}
        }
        ctx.say(reply).await?;
        Ok(())
    }

    /// Lists the latest changes made in the flat.
    #[poise::command(slash_command, guild_only, rename = "activity")]
    pub async fn month_activity(
        ctx: Context<'_>,
        #[description = "How many entries to show (default 10, max 50)"] limit: Option<u64>,
    ) -> Result<()> {
        let Some(actor) = context::resolve_actor(ctx).await? else {
            return Ok(());
        };
        let limit = limit
            .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
            .clamp(1, MAX_ACTIVITY_LIMIT);
        let entries = ctx.data().gateway.recent_activity(actor.auth, limit).await?;

        if entries.is_empty() {
            ctx.say("📭 No activity yet.").await?;
            return Ok(());
        }

        let mut lines = String::new();
        for entry in &entries {
            writeln!(
                lines,
                "{} {:<14} {}",
                entry.created_at.format("%Y-%m-%d %H:%M"),
                entry.action,
                entry.description
            )?;
        }

        let embed = serenity::CreateEmbed::default()
            .title("**Recent activity**")
            .color(0x0058_65F2)
            .description(context::code_block(&lines));

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
