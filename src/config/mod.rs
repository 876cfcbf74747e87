/// Database configuration and connection management
pub mod database;

/// Ledger policy, roles and flat seeding from config.toml
pub mod settings;
