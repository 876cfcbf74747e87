//! Shared test utilities for `FlatLedger`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test flats, members and gateways with sensible defaults.

use crate::{
    config::settings::{LedgerSettings, default_roles},
    core::{
        auth::{AuthContext, Capability, RoleTable},
        flat, members,
        gateway::MutationGateway,
    },
    entities,
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Shorthand for a calendar date; panics on an invalid date.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Creates a flat bound to `guild_id`.
pub async fn create_test_flat(
    db: &DatabaseConnection,
    name: &str,
    guild_id: &str,
) -> Result<entities::flat::Model> {
    flat::create_flat(db, name, guild_id).await
}

/// Sets up a flat with two active members.
///
/// # Defaults
/// * flat: "Test Flat", guild `"guild-1"`
/// * Alice: user `"user-alice"`, role `"owner"`
/// * Bob: user `"user-bob"`, role `"member"`
pub async fn setup_with_flat() -> Result<(
    DatabaseConnection,
    entities::flat::Model,
    entities::membership::Model,
    entities::membership::Model,
)> {
    let db = setup_test_db().await?;
    let flat = create_test_flat(&db, "Test Flat", "guild-1").await?;
    let alice = members::add_member(&db, flat.id, "user-alice", "Alice", "owner").await?;
    let bob = members::add_member(&db, flat.id, "user-bob", "Bob", "member").await?;
    Ok((db, flat, alice, bob))
}

/// Context of `member` acting in `flat`.
#[must_use]
pub const fn ctx_for(
    flat: &entities::flat::Model,
    member: &entities::membership::Model,
) -> AuthContext {
    AuthContext::new(flat.id, member.id)
}

/// Role table granting every capability to the given members.
#[must_use]
pub fn full_access(
    flat: &entities::flat::Model,
    grantees: &[&entities::membership::Model],
) -> RoleTable {
    let mut table = RoleTable::default();
    for member in grantees {
        table.grant(flat.id, member.id, Capability::ALL);
    }
    table
}

/// Test gateway type.
pub type TestGateway = MutationGateway<RoleTable>;

/// Sets up a flat and a gateway using the default role table
/// (Alice is owner, Bob is member).
pub async fn setup_gateway() -> Result<(
    TestGateway,
    entities::flat::Model,
    entities::membership::Model,
    entities::membership::Model,
)> {
    setup_gateway_with(|_, _, _, _| {}).await
}

/// Like [`setup_gateway`], with a hook to adjust the role table.
pub async fn setup_gateway_with<F>(
    adjust: F,
) -> Result<(
    TestGateway,
    entities::flat::Model,
    entities::membership::Model,
    entities::membership::Model,
)>
where
    F: FnOnce(
        &mut RoleTable,
        &entities::flat::Model,
        &entities::membership::Model,
        &entities::membership::Model,
    ),
{
    let (db, flat, alice, bob) = setup_with_flat().await?;
    let mut table = RoleTable::load(&db, &default_roles()).await?;
    adjust(&mut table, &flat, &alice, &bob);

    let gateway = MutationGateway::new(db, table, LedgerSettings::default());
    Ok((gateway, flat, alice, bob))
}
