//! Expense Discord commands - `expense add|edit|delete|list`.
//!
//! Thin wrappers over the gateway's expense operations. Payers default to the
//! command author.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{Context, context, handlers::autocomplete},
        core::{gateway::ExpenseInput, report},
        errors::Result,
    };
    use poise::serenity_prelude as serenity;

    /// Parent command for recording and correcting shared expenses.
    #[poise::command(
        slash_command,
        guild_only,
        subcommands("expense_add", "expense_edit", "expense_delete", "expense_list")
    )]
    pub async fn expense(ctx: Context<'_>) -> Result<()> {
        let help_text = "Expense command. Available subcommands:\n\
            `/expense add` - Record an expense\n\
            `/expense edit` - Change an expense\n\
            `/expense delete` - Remove an expense\n\
            `/expense list` - List a month's expenses";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Records an expense paid for the flat.
    #[poise::command(slash_command, guild_only, rename = "add")]
    pub async fn expense_add(
        ctx: Context<'_>,
        #[description = "Amount paid (e.g. 300.00)"] amount: String,
        #[description = "What was bought"] description: Option<String>,
        #[description = "Date as YYYY-MM-DD (defaults to today)"] date: Option<String>,
        #[description = "Who paid (defaults to you)"]
        #[autocomplete = "autocomplete::autocomplete_member_name"]
        payer: Option<String>,
    ) -> Result<()> {
        let Some(actor) = context::resolve_actor(ctx).await? else {
            return Ok(());
        };
        let payer = context::resolve_member(ctx, &actor, payer.as_deref()).await?;

        let input = ExpenseInput {
            payer_id: payer.id,
            amount: context::parse_decimal(&amount)?,
            description: description.unwrap_or_default(),
            date: context::parse_date(date.as_deref())?,
        };
        let change = ctx.data().gateway.create_expense(actor.auth, input).await?;

        ctx.say(format!(
            "✅ Recorded {}\n{}",
            report::format_expense_line(&change.expense),
            report::format_summary_line(&change.summary),
        ))
        .await?;
        Ok(())
    }

    /// Replaces the amount, description, date and payer of an expense.
    #[poise::command(slash_command, guild_only, rename = "edit")]
    pub async fn expense_edit(
        ctx: Context<'_>,
        #[description = "Expense ID"] id: i64,
        #[description = "Amount paid (e.g. 300.00)"] amount: String,
        #[description = "What was bought"] description: Option<String>,
        #[description = "Date as YYYY-MM-DD (defaults to the current date of the expense)"]
        date: Option<String>,
        #[description = "Who paid (defaults to the current payer)"]
        #[autocomplete = "autocomplete::autocomplete_member_name"]
        payer: Option<String>,
    ) -> Result<()> {
        let Some(actor) = context::resolve_actor(ctx).await? else {
            return Ok(());
        };
        let gateway = &ctx.data().gateway;
        let current = gateway.get_expense(actor.auth, id).await?;

        let payer_id = if payer.is_some() {
            context::resolve_member(ctx, &actor, payer.as_deref()).await?.id
        } else {
            current.payer_id
        };
        let date = match date.as_deref() {
            Some(value) => context::parse_date(Some(value))?,
            None => current.date,
        };

        let input = ExpenseInput {
            payer_id,
            amount: context::parse_decimal(&amount)?,
            description: description.unwrap_or(current.description),
            date,
        };
        let change = gateway.update_expense(actor.auth, id, input).await?;

        let mut reply = format!(
            "✅ Updated {}\n{}",
            report::format_expense_line(&change.expense),
            report::format_summary_line(&change.summary),
        );
        if let Some(previous) = &change.previous_summary {
            reply.push('\n');
            reply.push_str(&report::format_summary_line(previous));
        }
        ctx.say(reply).await?;
        Ok(())
    }

    /// Removes an expense.
    #[poise::command(slash_command, guild_only, rename = "delete")]
    pub async fn expense_delete(
        ctx: Context<'_>,
        #[description = "Expense ID"] id: i64,
    ) -> Result<()> {
        let Some(actor) = context::resolve_actor(ctx).await? else {
            return Ok(());
        };
        let deletion = ctx.data().gateway.delete_expense(actor.auth, id).await?;

        ctx.say(format!(
            "🗑️ Deleted {}\n{}",
            report::format_expense_line(&deletion.expense),
            report::format_summary_line(&deletion.summary),
        ))
        .await?;
        Ok(())
    }

    /// Lists the expenses of a month, newest first.
    #[poise::command(slash_command, guild_only, rename = "list")]
    pub async fn expense_list(
        ctx: Context<'_>,
        #[description = "Month as YYYY-MM (defaults to this month)"] month: Option<String>,
    ) -> Result<()> {
        let Some(actor) = context::resolve_actor(ctx).await? else {
            return Ok(());
        };
        let period = context::parse_month(month.as_deref())?;
        let expenses = ctx
            .data()
            .gateway
            .list_expenses(actor.auth, period.year(), period.month())
            .await?;

        if expenses.is_empty() {
            ctx.say(format!("📭 No expenses recorded for {period}."))
                .await?;
            return Ok(());
        }

        let lines: Vec<String> = expenses.iter().map(report::format_expense_line).collect();
        let embed = serenity::CreateEmbed::default()
            .title(format!("**Expenses {period}**"))
            .color(0x0058_65F2)
            .description(context::code_block(&format!("{}\n", lines.join("\n"))));

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
