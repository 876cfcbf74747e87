//! Database configuration module for `FlatLedger`.
//!
//! Connection setup and schema creation for the `SQLite` store. Tables are generated
//! from the entity definitions with `Schema::create_table_from_entity`; the composite
//! natural keys the ledger relies on are added as unique indexes afterwards.

use crate::entities::{
    ActivityLog, ExpenseEntry, Flat, MealEntry, MemberMonthStatus, Membership, MonthlySummary,
    meal_entry, member_month_status, membership, monthly_summary,
};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, Schema,
    sea_query::{Index, IndexCreateStatement},
};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/flat_ledger.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, or the
/// default local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Connects to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url()).await.map_err(Into::into)
}

/// Creates every table and unique index that does not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = [
        schema.create_table_from_entity(Flat),
        schema.create_table_from_entity(Membership),
        schema.create_table_from_entity(MemberMonthStatus),
        schema.create_table_from_entity(MealEntry),
        schema.create_table_from_entity(ExpenseEntry),
        schema.create_table_from_entity(MonthlySummary),
        schema.create_table_from_entity(ActivityLog),
    ];
    for mut table in tables {
        db.execute(builder.build(table.if_not_exists())).await?;
    }

    for index in unique_indexes() {
        db.execute(builder.build(&index)).await?;
    }

    Ok(())
}

fn unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("idx_meal_entries_flat_member_date")
            .table(MealEntry)
            .col(meal_entry::Column::FlatId)
            .col(meal_entry::Column::MemberId)
            .col(meal_entry::Column::Date)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_monthly_summaries_flat_year_month")
            .table(MonthlySummary)
            .col(monthly_summary::Column::FlatId)
            .col(monthly_summary::Column::Year)
            .col(monthly_summary::Column::Month)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_memberships_flat_user")
            .table(Membership)
            .col(membership::Column::FlatId)
            .col(membership::Column::UserId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_member_month_statuses_member_year_month")
            .table(MemberMonthStatus)
            .col(member_month_status::Column::MembershipId)
            .col(member_month_status::Column::Year)
            .col(member_month_status::Column::Month)
            .unique()
            .if_not_exists()
            .to_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{core::ledger, errors::Error, test_utils::*};
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        Flat::find().limit(1).all(&db).await?;
        Membership::find().limit(1).all(&db).await?;
        MemberMonthStatus::find().limit(1).all(&db).await?;
        MealEntry::find().limit(1).all(&db).await?;
        ExpenseEntry::find().limit(1).all(&db).await?;
        MonthlySummary::find().limit(1).all(&db).await?;
        ActivityLog::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_meal_cell_is_a_conflict() -> Result<()> {
        let (db, flat, alice, _bob) = setup_with_flat().await?;
        ledger::upsert_meal(&db, flat.id, alice.id, day(2026, 2, 1), 10).await?;

        // bypass the upsert to hit the natural key directly
        let duplicate = meal_entry::ActiveModel {
            flat_id: sea_orm::Set(flat.id),
            member_id: sea_orm::Set(alice.id),
            date: sea_orm::Set(day(2026, 2, 1)),
            meal_tenths: sea_orm::Set(5),
            created_at: sea_orm::Set(chrono::Utc::now()),
            updated_at: sea_orm::Set(chrono::Utc::now()),
            ..Default::default()
        };
        let result = MealEntry::insert(duplicate).exec(&db).await.map_err(Error::from);
        assert!(matches!(result, Err(Error::Conflict { .. })));

        Ok(())
    }

    #[test]
    fn test_default_database_url() {
        // only meaningful when DATABASE_URL is unset
        if std::env::var("DATABASE_URL").is_err() {
            assert_eq!(get_database_url(), DEFAULT_DATABASE_URL);
        }
    }
}
