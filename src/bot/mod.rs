//! Bot layer - Discord-specific interface and command handlers
//!
//! This module provides the Discord interface for `FlatLedger`: slash commands
//! that resolve the calling guild and user to a flat membership and forward to
//! the [`MutationGateway`]. No ledger logic lives here.

/// Discord command implementations (meal, expense, month, general)
pub mod commands;
/// Resolution of the calling flat and member, and argument parsing
pub mod context;
/// Discord interaction handlers (autocomplete, etc.)
pub mod handlers;

use crate::{
    core::{auth::RoleTable, gateway::MutationGateway},
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use tracing::{error, info, instrument, warn};

/// Shared data available to all bot commands.
pub struct BotData {
    /// Gateway every command goes through
    pub gateway: MutationGateway<RoleTable>,
}

impl BotData {
    /// Creates a new `BotData` instance around the gateway.
    #[must_use]
    pub const fn new(gateway: MutationGateway<RoleTable>) -> Self {
        Self { gateway }
    }
}

/// Poise context used by every command.
pub type Context<'a> = poise::Context<'a, BotData, Error>;

/// Whether an error is the caller's to fix, as opposed to a fault of the bot.
const fn is_user_error(error: &Error) -> bool {
    matches!(
        error,
        Error::InvalidInput { .. }
            | Error::NotFound { .. }
            | Error::MonthLocked { .. }
            | Error::Forbidden { .. }
            | Error::Conflict { .. }
    )
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {:?}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            let message = if is_user_error(&error) {
                warn!("Command `{}` rejected: {}", ctx.command().name, error);
                format!("❌ {error}")
            } else {
                error!("Error in command `{}`: {:?}", ctx.command().name, error);
                "❌ Something went wrong, please try again later.".to_string()
            };
            if let Err(e) = ctx.say(message).await {
                error!("Failed to send error message: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Registers the slash commands and runs the Discord client until it stops.
#[instrument(skip(token, data))]
pub async fn run_bot(token: String, data: BotData) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::ping(),
                commands::help(),
                commands::meal(),
                commands::expense(),
                commands::month(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {:?}", e))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {:?}", e))?;
    Ok(())
}
