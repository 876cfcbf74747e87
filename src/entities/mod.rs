//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod activity_log;
pub mod expense_entry;
pub mod flat;
pub mod meal_entry;
pub mod member_month_status;
pub mod membership;
pub mod monthly_summary;

// Re-export specific types to avoid conflicts
pub use activity_log::{
    Column as ActivityLogColumn, Entity as ActivityLog, Model as ActivityLogModel,
};
pub use expense_entry::{
    Column as ExpenseEntryColumn, Entity as ExpenseEntry, Model as ExpenseEntryModel,
};
pub use flat::{Column as FlatColumn, Entity as Flat, Model as FlatModel};
pub use meal_entry::{Column as MealEntryColumn, Entity as MealEntry, Model as MealEntryModel};
pub use member_month_status::{
    Column as MemberMonthStatusColumn, Entity as MemberMonthStatus,
    Model as MemberMonthStatusModel,
};
pub use membership::{Column as MembershipColumn, Entity as Membership, Model as MembershipModel};
pub use monthly_summary::{
    Column as MonthlySummaryColumn, Entity as MonthlySummary, Model as MonthlySummaryModel,
};
