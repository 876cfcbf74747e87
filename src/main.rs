use dotenvy::dotenv;
use flat_ledger::{
    bot::{self, BotData},
    config::{database, settings},
    core::{auth::RoleTable, gateway::MutationGateway},
    errors::{Error, Result},
};
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Directory holding the default `SQLite` file.
const DATA_DIR: &str = "data";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the application configuration
    let config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    info!(
        "Configuration loaded: {} roles, {} flats",
        config.roles.len(),
        config.flats.len()
    );

    // 4. Connect and create the schema
    if env::var("DATABASE_URL").is_err() {
        std::fs::create_dir_all(DATA_DIR)?;
    }
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed flats and load the role table
    settings::seed_flats(&db, &config)
        .await
        .inspect_err(|e| error!("Failed to seed flats: {}", e))?;
    let roles = RoleTable::load(&db, &config.roles).await?;

    // 6. Run the bot
    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!("DISCORD_BOT_TOKEN not found: {}", e))
        .map_err(Error::EnvVar)?;

    let gateway = MutationGateway::new(db, roles, config.ledger);
    bot::run_bot(token, BotData::new(gateway)).await
}
