//! General Discord commands - ping and help.
//! This module contains simple commands that don't require database operations
//! and provide basic bot functionality and user assistance.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::Context,
        errors::Result,
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: Context<'_>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: Context<'_>) -> Result<()> {
        let help_text = "**FlatLedger Help**\n\
        Track shared meals and expenses of your flat and split the month fairly.\n\n\
        **Meals**\n\
        • `/meal <count> [date] [member]` - Sets meals eaten on a day (steps of 0.5).\n\n\
        **Expenses**\n\
        • `/expense add <amount> [description] [date] [payer]` - Records an expense.\n\
        • `/expense edit <id> <amount> [description] [date] [payer]` - Changes an expense.\n\
        • `/expense delete <id>` - Removes an expense.\n\
        • `/expense list [month]` - Lists a month's expenses.\n\n\
        **Months**\n\
        • `/month summary [month]` - Totals, meal rate and everyone's balance.\n\
        • `/month grid [month]` - Meals per day and member.\n\
        • `/month lock [month]` / `/month unlock [month]` - Closes or reopens a month.\n\
        • `/month status <member> <active> [from] [until] [month]` - Sets who takes part in a month.\n\
        • `/month activity [limit]` - Recent changes.\n\n\
        **Utility Commands**\n\
        • `/ping` - Checks if the bot is responsive.\n\
        • `/help` - Shows this help message.\n\n\
        Dates are `YYYY-MM-DD`, months are `YYYY-MM`; both default to today.\n\
        A positive balance means the flat owes you money.";

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
