//! Application configuration loading from config.toml
//!
//! The file carries the ledger policy, the role table that maps membership roles
//! to capabilities, and the flats (with their members) to seed on startup. Every
//! section is optional.

use crate::{
    core::{auth::Capability, flat, members},
    errors::{Error, Result},
};
use sea_orm::ConnectionTrait;
use serde::Deserialize;
use std::{collections::HashMap, path::Path};
use tracing::info;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Ledger policy
    pub ledger: LedgerSettings,
    /// Role name -> capabilities
    pub roles: HashMap<String, Vec<Capability>>,
    /// Flats to seed
    pub flats: Vec<FlatConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerSettings::default(),
            roles: default_roles(),
            flats: Vec::new(),
        }
    }
}

/// Ledger policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Whether a locked month also rejects expense writes
    pub lock_expenses: bool,
    /// How often a conflicting transaction is re-run before giving up
    pub conflict_retries: u32,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            lock_expenses: true,
            conflict_retries: 3,
        }
    }
}

/// A flat to create on startup
#[derive(Debug, Clone, Deserialize)]
pub struct FlatConfig {
    /// Flat name
    pub name: String,
    /// Discord guild managing the flat
    pub guild_id: String,
    /// Members to add
    #[serde(default)]
    pub members: Vec<MemberConfig>,
}

/// A member to add to a seeded flat
#[derive(Debug, Clone, Deserialize)]
pub struct MemberConfig {
    /// Discord user ID
    pub user_id: String,
    /// Name shown in grids and balance tables
    pub display_name: String,
    /// Role name from `[roles]`
    #[serde(default = "default_member_role")]
    pub role: String,
}

fn default_member_role() -> String {
    "member".to_string()
}

/// Built-in roles: `owner` holds everything, `manager` can close months and
/// write for others, `member` handles their own meals and expenses.
#[must_use]
pub fn default_roles() -> HashMap<String, Vec<Capability>> {
    let member = vec![
        Capability::ViewMeals,
        Capability::AddMeal,
        Capability::ViewExpenses,
        Capability::AddExpense,
        Capability::EditExpense,
        Capability::DeleteExpense,
    ];
    let mut manager = member.clone();
    manager.extend([
        Capability::CloseMonth,
        Capability::ReopenMonth,
        Capability::EditOtherUsers,
    ]);

    HashMap::from([
        ("owner".to_string(), Capability::ALL.to_vec()),
        ("manager".to_string(), manager),
        ("member".to_string(), member),
    ])
}

impl AppConfig {
    /// Checks cross-references the TOML syntax cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.ledger.conflict_retries > 10 {
            return Err(Error::Config {
                message: format!(
                    "ledger.conflict_retries must be at most 10, got {}",
                    self.ledger.conflict_retries
                ),
            });
        }

        for flat in &self.flats {
            for member in &flat.members {
                if !self.roles.contains_key(&member.role) {
                    return Err(Error::Config {
                        message: format!(
                            "Member {} of flat {} has unknown role `{}`",
                            member.user_id, flat.name, member.role
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Loads and validates the configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A member references an undefined role
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses and validates configuration text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads the file named by `FLAT_LEDGER_CONFIG`, or ./config.toml
///
/// A missing file yields the default configuration.
pub fn load_default_config() -> Result<AppConfig> {
    let path =
        std::env::var("FLAT_LEDGER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if !Path::new(&path).exists() {
        info!("No configuration file at {path}, using defaults");
        return Ok(AppConfig::default());
    }
    load_config(path)
}

/// Creates the configured flats and members that do not exist yet.
///
/// Existing rows are left as they are.
///
/// # Returns
/// Number of flats and memberships created.
pub async fn seed_flats<C>(db: &C, config: &AppConfig) -> Result<(usize, usize)>
where
    C: ConnectionTrait,
{
    let mut flats_created = 0;
    let mut members_created = 0;

    for flat_config in &config.flats {
        let flat = if let Some(existing) = flat::get_flat_by_guild(db, &flat_config.guild_id).await? {
            existing
        } else {
            flats_created += 1;
            flat::create_flat(db, &flat_config.name, &flat_config.guild_id).await?
        };

        for member in &flat_config.members {
            if members::find_member_by_user(db, flat.id, &member.user_id)
                .await?
                .is_none()
            {
                members::add_member(db, flat.id, &member.user_id, &member.display_name, &member.role)
                    .await?;
                members_created += 1;
            }
        }
    }

    info!(
        "Seeded {} flats and {} memberships from configuration",
        flats_created, members_created
    );
    Ok((flats_created, members_created))
}
