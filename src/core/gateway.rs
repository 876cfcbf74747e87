//! Mutation gateway - the only path by which meal and expense rows change.
//!
//! Each mutation runs in one database transaction that locks the affected
//! monthly summary rows, checks the month lock, writes the ledger, recalculates
//! the month and appends an activity row before committing. The read operations
//! used by the bot live here too, so every call goes through the same
//! [`AuthContext`] and capability checks.
//!
//! Transactions that fail with [`Error::Conflict`] are re-run from scratch up to
//! [`LedgerSettings::conflict_retries`] times.

use crate::{
    config::settings::LedgerSettings,
    core::{
        activity::{self, ActivityAction},
        aggregation, amount,
        auth::{self, AuthContext, Authorizer, Capability},
        balance::{self, MemberBalance},
        ledger::{self, ExpenseFields},
        members::{self, MonthStatusUpdate},
        period::MonthPeriod,
        summary::{self, MonthSummary},
    },
    entities::{activity_log, expense_entry, meal_entry, member_month_status, membership},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Serialize;
use serde_json::json;
use std::{collections::HashMap, future::Future};
use tracing::{info, instrument, warn};

/// Longest accepted expense description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// A meal cell write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MealCellInput {
    /// Member who ate
    pub member_id: i64,
    /// Day of the cell
    pub date: NaiveDate,
    /// Meals eaten, a multiple of 0.5
    pub meal_count: Decimal,
}

/// An expense create or update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseInput {
    /// Member who paid
    pub payer_id: i64,
    /// Amount paid, at most two decimal places
    pub amount: Decimal,
    /// Free text, trimmed
    pub description: String,
    /// Day the expense is accounted to
    pub date: NaiveDate,
}

/// A meal cell as shown to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MealEntryView {
    /// Entry id
    pub id: i64,
    /// Member who ate
    pub member_id: i64,
    /// Member display name
    pub member_name: String,
    /// Day of the cell
    pub date: NaiveDate,
    /// Meals eaten
    pub meal_count: Decimal,
}

impl MealEntryView {
    fn new(entry: &meal_entry::Model, member_name: String) -> Self {
        Self {
            id: entry.id,
            member_id: entry.member_id,
            member_name,
            date: entry.date,
            meal_count: amount::tenths_to_meals(entry.meal_tenths),
        }
    }
}

/// An expense as shown to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpenseView {
    /// Expense id
    pub id: i64,
    /// Member who paid
    pub payer_id: i64,
    /// Payer display name
    pub payer_name: String,
    /// Amount paid
    pub amount: Decimal,
    /// Free text
    pub description: String,
    /// Day the expense is accounted to
    pub date: NaiveDate,
}

impl ExpenseView {
    fn new(expense: &expense_entry::Model, payer_name: String) -> Self {
        Self {
            id: expense.id,
            payer_id: expense.payer_id,
            payer_name,
            amount: amount::cents_to_money(expense.amount_cents),
            description: expense.description.clone(),
            date: expense.date,
        }
    }
}

/// Result of a meal cell write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MealCellUpdate {
    /// Stored cell
    pub entry: MealEntryView,
    /// `true` if the cell did not exist before
    pub created: bool,
    /// Refreshed month summary
    pub summary: MonthSummary,
    /// Refreshed member balances
    pub balances: Vec<MemberBalance>,
}

/// Result of an expense create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpenseChange {
    /// Stored expense
    pub expense: ExpenseView,
    /// Refreshed summary of the expense's month
    pub summary: MonthSummary,
    /// Refreshed summary of the month the expense moved out of, if it moved
    pub previous_summary: Option<MonthSummary>,
}

/// Result of an expense deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpenseDeletion {
    /// The expense as it was before deletion
    pub expense: ExpenseView,
    /// Refreshed summary of the month the expense belonged to
    pub summary: MonthSummary,
}

/// Summary and balances of a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthReport {
    /// Month totals and lock state
    pub summary: MonthSummary,
    /// One entry per active member
    pub balances: Vec<MemberBalance>,
}

/// Everything recorded for a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthView {
    /// The month
    pub period: MonthPeriod,
    /// Meal cells by date, then member name
    pub meals: Vec<MealEntryView>,
    /// Expenses, newest first; empty without `view_expenses`
    pub expenses: Vec<ExpenseView>,
    /// Month totals and lock state
    pub summary: MonthSummary,
    /// One entry per active member
    pub balances: Vec<MemberBalance>,
}

/// Entry point for every ledger operation.
#[derive(Debug)]
pub struct MutationGateway<A> {
    db: DatabaseConnection,
    authorizer: A,
    settings: LedgerSettings,
}

impl<A: Authorizer> MutationGateway<A> {
    /// Creates a gateway over a connection.
    pub const fn new(db: DatabaseConnection, authorizer: A, settings: LedgerSettings) -> Self {
        Self {
            db,
            authorizer,
            settings,
        }
    }

    /// Underlying connection, for lookups that need no capability.
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Consumes the gateway, returning its connection.
    #[must_use]
    pub fn into_db(self) -> DatabaseConnection {
        self.db
    }

    /// Writes one meal cell and returns the refreshed month.
    #[instrument(skip(self))]
    pub async fn upsert_meal_cell(
        &self,
        ctx: AuthContext,
        input: MealCellInput,
    ) -> Result<MealCellUpdate> {
        auth::require_for_member(&self.authorizer, &ctx, Capability::AddMeal, input.member_id)?;
        let period = MonthPeriod::containing(input.date)?;
        let meal_tenths = amount::meal_count_to_tenths(input.meal_count)?;

        let input = &input;
        let update = self
            .retrying("upsert_meal_cell", move || {
                self.try_upsert_meal_cell(ctx, input, period, meal_tenths)
            })
            .await?;

        info!(
            flat_id = ctx.flat_id,
            member_id = input.member_id,
            date = %input.date,
            meal_count = %update.entry.meal_count,
            "Meal cell saved"
        );
        Ok(update)
    }

    async fn try_upsert_meal_cell(
        &self,
        ctx: AuthContext,
        input: &MealCellInput,
        period: MonthPeriod,
        meal_tenths: i64,
    ) -> Result<MealCellUpdate> {
        let period = &period;
        let txn = self.db.begin().await?;

        let member = members::find_member(&txn, ctx.flat_id, input.member_id).await?;
        let existing = ledger::find_meal(&txn, ctx.flat_id, member.id, input.date).await?;
        if existing.is_none() {
            ensure_member_active(&member)?;
        }

        let row = summary::lock_row(&txn, ctx.flat_id, period).await?;
        summary::ensure_open(&row, period)?;

        let (entry, created) =
            ledger::upsert_meal(&txn, ctx.flat_id, member.id, input.date, meal_tenths).await?;
        let (summary, balances) = refresh_month(&txn, ctx.flat_id, period).await?;

        let action = if created {
            ActivityAction::MealAdd
        } else {
            ActivityAction::MealUpdate
        };
        let entry = MealEntryView::new(&entry, member.display_name);
        activity::record(
            &txn,
            &ctx,
            action,
            format!(
                "{} meals for {} on {}",
                entry.meal_count, entry.member_name, entry.date
            ),
            json!({
                "member_id": entry.member_id,
                "date": entry.date,
                "meal_count": entry.meal_count,
                "previous_meal_count": existing.map(|e| amount::tenths_to_meals(e.meal_tenths)),
            }),
        )
        .await?;

        txn.commit().await?;

        Ok(MealCellUpdate {
            entry,
            created,
            summary,
            balances,
        })
    }

    /// Records a new expense.
    ///
    /// Retries re-run the insert; callers that retry on their own must
    /// deduplicate.
    #[instrument(skip(self))]
    pub async fn create_expense(
        &self,
        ctx: AuthContext,
        input: ExpenseInput,
    ) -> Result<ExpenseChange> {
        auth::require_for_member(&self.authorizer, &ctx, Capability::AddExpense, input.payer_id)?;
        let fields = validate_expense(&input)?;
        let period = MonthPeriod::containing(fields.date)?;

        let fields = &fields;
        let change = self
            .retrying("create_expense", move || {
                self.try_create_expense(ctx, fields, period)
            })
            .await?;

        info!(
            flat_id = ctx.flat_id,
            expense_id = change.expense.id,
            amount = %change.expense.amount,
            "Expense created"
        );
        Ok(change)
    }

    async fn try_create_expense(
        &self,
        ctx: AuthContext,
        fields: &ExpenseFields,
        period: MonthPeriod,
    ) -> Result<ExpenseChange> {
        let period = &period;
        let txn = self.db.begin().await?;

        let payer = members::find_member(&txn, ctx.flat_id, fields.payer_id).await?;
        ensure_member_active(&payer)?;

        let row = summary::lock_row(&txn, ctx.flat_id, period).await?;
        if self.settings.lock_expenses {
            summary::ensure_open(&row, period)?;
        }

        let expense = ledger::insert_expense(&txn, ctx.flat_id, fields.clone()).await?;
        let row = aggregation::recalculate_month(&txn, ctx.flat_id, period).await?;

        let expense = ExpenseView::new(&expense, payer.display_name);
        activity::record(
            &txn,
            &ctx,
            ActivityAction::ExpenseAdd,
            format!("{} paid {} on {}", expense.payer_name, expense.amount, expense.date),
            json!({
                "expense_id": expense.id,
                "payer_id": expense.payer_id,
                "amount": expense.amount,
                "date": expense.date,
            }),
        )
        .await?;

        txn.commit().await?;

        Ok(ExpenseChange {
            expense,
            summary: MonthSummary::from_row(&row, period),
            previous_summary: None,
        })
    }

    /// Overwrites an expense. Moving it to another month recalculates both months.
    #[instrument(skip(self))]
    pub async fn update_expense(
        &self,
        ctx: AuthContext,
        expense_id: i64,
        input: ExpenseInput,
    ) -> Result<ExpenseChange> {
        auth::require_for_member(&self.authorizer, &ctx, Capability::EditExpense, input.payer_id)?;
        let fields = validate_expense(&input)?;
        let period = MonthPeriod::containing(fields.date)?;

        let fields = &fields;
        let change = self
            .retrying("update_expense", move || {
                self.try_update_expense(ctx, expense_id, fields, period)
            })
            .await?;

        info!(
            flat_id = ctx.flat_id,
            expense_id,
            moved = change.previous_summary.is_some(),
            "Expense updated"
        );
        Ok(change)
    }

    async fn try_update_expense(
        &self,
        ctx: AuthContext,
        expense_id: i64,
        fields: &ExpenseFields,
        period: MonthPeriod,
    ) -> Result<ExpenseChange> {
        let period = &period;
        let txn = self.db.begin().await?;

        let existing = ledger::find_expense(&txn, ctx.flat_id, expense_id)
            .await?
            .ok_or_else(|| Error::not_found("expense", expense_id))?;
        if existing.payer_id != ctx.actor_id {
            auth::require(&self.authorizer, &ctx, Capability::EditOtherUsers)?;
        }

        let payer = members::find_member(&txn, ctx.flat_id, fields.payer_id).await?;
        if payer.id != existing.payer_id {
            ensure_member_active(&payer)?;
        }

        let previous_period = MonthPeriod::containing(existing.date)?;
        let moved = previous_period != *period;

        // lock in month order so two cross-month updates cannot wait on each other
        let mut periods = vec![*period];
        if moved {
            periods.push(previous_period);
            periods.sort();
        }
        for locked_period in &periods {
            let row = summary::lock_row(&txn, ctx.flat_id, locked_period).await?;
            if self.settings.lock_expenses {
                summary::ensure_open(&row, locked_period)?;
            }
        }

        let before = ExpenseView::new(&existing, String::new());
        let expense = ledger::update_expense(&txn, existing, fields.clone()).await?;

        let row = aggregation::recalculate_month(&txn, ctx.flat_id, period).await?;
        let previous_summary = if moved {
            let previous = aggregation::recalculate_month(&txn, ctx.flat_id, &previous_period).await?;
            Some(MonthSummary::from_row(&previous, &previous_period))
        } else {
            None
        };

        let expense = ExpenseView::new(&expense, payer.display_name);
        activity::record(
            &txn,
            &ctx,
            ActivityAction::ExpenseUpdate,
            format!("Expense #{} updated to {}", expense.id, expense.amount),
            json!({
                "expense_id": expense.id,
                "before": { "payer_id": before.payer_id, "amount": before.amount, "date": before.date },
                "after": { "payer_id": expense.payer_id, "amount": expense.amount, "date": expense.date },
            }),
        )
        .await?;

        txn.commit().await?;

        Ok(ExpenseChange {
            expense,
            summary: MonthSummary::from_row(&row, period),
            previous_summary,
        })
    }

    /// Deletes an expense and recalculates the month it was dated in.
    #[instrument(skip(self))]
    pub async fn delete_expense(&self, ctx: AuthContext, expense_id: i64) -> Result<ExpenseDeletion> {
        auth::require(&self.authorizer, &ctx, Capability::DeleteExpense)?;

        let deletion = self
            .retrying("delete_expense", move || self.try_delete_expense(ctx, expense_id))
            .await?;

        info!(
            flat_id = ctx.flat_id,
            expense_id,
            date = %deletion.expense.date,
            "Expense deleted"
        );
        Ok(deletion)
    }

    async fn try_delete_expense(&self, ctx: AuthContext, expense_id: i64) -> Result<ExpenseDeletion> {
        let txn = self.db.begin().await?;

        let existing = ledger::find_expense(&txn, ctx.flat_id, expense_id)
            .await?
            .ok_or_else(|| Error::not_found("expense", expense_id))?;
        if existing.payer_id != ctx.actor_id {
            auth::require(&self.authorizer, &ctx, Capability::EditOtherUsers)?;
        }

        // taken from the row before it is removed
        let period = MonthPeriod::containing(existing.date)?;
        let row = summary::lock_row(&txn, ctx.flat_id, &period).await?;
        if self.settings.lock_expenses {
            summary::ensure_open(&row, &period)?;
        }

        let payer = members::find_member(&txn, ctx.flat_id, existing.payer_id).await?;
        let expense = ExpenseView::new(&existing, payer.display_name);

        ledger::delete_expense(&txn, existing.id).await?;
        let row = aggregation::recalculate_month(&txn, ctx.flat_id, &period).await?;

        activity::record(
            &txn,
            &ctx,
            ActivityAction::ExpenseDelete,
            format!("Expense #{} of {} deleted", expense.id, expense.amount),
            json!({
                "expense_id": expense.id,
                "payer_id": expense.payer_id,
                "amount": expense.amount,
                "date": expense.date,
            }),
        )
        .await?;

        txn.commit().await?;

        Ok(ExpenseDeletion {
            expense,
            summary: MonthSummary::from_row(&row, &period),
        })
    }

    /// Locks a month after bringing its totals up to date.
    #[instrument(skip(self))]
    pub async fn lock_month(&self, ctx: AuthContext, year: i32, month: u32) -> Result<MonthSummary> {
        auth::require(&self.authorizer, &ctx, Capability::CloseMonth)?;
        let period = MonthPeriod::new(year, month)?;

        let summary = self
            .retrying("lock_month", move || self.try_lock_month(ctx, period))
            .await?;

        info!(flat_id = ctx.flat_id, %period, actor_id = ctx.actor_id, "Month locked");
        Ok(summary)
    }

    async fn try_lock_month(&self, ctx: AuthContext, period: MonthPeriod) -> Result<MonthSummary> {
        let txn = self.db.begin().await?;

        let row = aggregation::recalculate_month(&txn, ctx.flat_id, &period).await?;
        let row = summary::set_locked(&txn, row, ctx.actor_id).await?;
        activity::record(
            &txn,
            &ctx,
            ActivityAction::MonthLock,
            format!("Locked {period}"),
            json!({ "year": period.year(), "month": period.month() }),
        )
        .await?;

        txn.commit().await?;
        Ok(MonthSummary::from_row(&row, &period))
    }

    /// Unlocks a month. Unlocking an open or uninitialized month changes nothing.
    #[instrument(skip(self))]
    pub async fn unlock_month(&self, ctx: AuthContext, year: i32, month: u32) -> Result<MonthSummary> {
        auth::require(&self.authorizer, &ctx, Capability::ReopenMonth)?;
        let period = MonthPeriod::new(year, month)?;

        self.retrying("unlock_month", move || self.try_unlock_month(ctx, period))
            .await
    }

    async fn try_unlock_month(&self, ctx: AuthContext, period: MonthPeriod) -> Result<MonthSummary> {
        let txn = self.db.begin().await?;

        if summary::find_row(&txn, ctx.flat_id, &period).await?.is_none() {
            return Ok(MonthSummary::empty(ctx.flat_id, &period));
        }

        let row = summary::lock_row(&txn, ctx.flat_id, &period).await?;
        if !row.is_locked {
            return Ok(MonthSummary::from_row(&row, &period));
        }

        let row = summary::set_unlocked(&txn, row).await?;
        activity::record(
            &txn,
            &ctx,
            ActivityAction::MonthUnlock,
            format!("Unlocked {period}"),
            json!({ "year": period.year(), "month": period.month() }),
        )
        .await?;

        txn.commit().await?;
        info!(flat_id = ctx.flat_id, %period, "Month unlocked");
        Ok(MonthSummary::from_row(&row, &period))
    }

    /// Fresh summary and balances of a month.
    #[instrument(skip(self))]
    pub async fn month_summary(&self, ctx: AuthContext, year: i32, month: u32) -> Result<MonthReport> {
        auth::require(&self.authorizer, &ctx, Capability::ViewMeals)?;
        let period = MonthPeriod::new(year, month)?;

        self.retrying("month_summary", move || async move {
            let txn = self.db.begin().await?;
            let (summary, balances) = refresh_month(&txn, ctx.flat_id, &period).await?;
            txn.commit().await?;
            Ok(MonthReport { summary, balances })
        })
        .await
    }

    /// Every meal cell and expense of a month with fresh summary and balances.
    #[instrument(skip(self))]
    pub async fn month_grid(&self, ctx: AuthContext, year: i32, month: u32) -> Result<MonthView> {
        auth::require(&self.authorizer, &ctx, Capability::ViewMeals)?;
        let with_expenses = self
            .authorizer
            .has_capability(&ctx, Capability::ViewExpenses);
        let period = MonthPeriod::new(year, month)?;

        self.retrying("month_grid", move || self.try_month_grid(ctx, period, with_expenses))
            .await
    }

    async fn try_month_grid(
        &self,
        ctx: AuthContext,
        period: MonthPeriod,
        with_expenses: bool,
    ) -> Result<MonthView> {
        let txn = self.db.begin().await?;

        let (summary, balances) = refresh_month(&txn, ctx.flat_id, &period).await?;
        let names = members::member_names(&txn, ctx.flat_id).await?;

        let mut meals: Vec<MealEntryView> = ledger::meals_in_period(&txn, ctx.flat_id, &period)
            .await?
            .iter()
            .map(|entry| MealEntryView::new(entry, name_of(&names, entry.member_id)))
            .collect();
        meals.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.member_name.cmp(&b.member_name))
                .then_with(|| a.member_id.cmp(&b.member_id))
        });

        let expenses = if with_expenses {
            expense_views(&txn, ctx.flat_id, &period, &names).await?
        } else {
            Vec::new()
        };

        txn.commit().await?;

        Ok(MonthView {
            period,
            meals,
            expenses,
            summary,
            balances,
        })
    }

    /// Expenses of a month, newest first.
    pub async fn list_expenses(
        &self,
        ctx: AuthContext,
        year: i32,
        month: u32,
    ) -> Result<Vec<ExpenseView>> {
        auth::require(&self.authorizer, &ctx, Capability::ViewExpenses)?;
        let period = MonthPeriod::new(year, month)?;

        let names = members::member_names(&self.db, ctx.flat_id).await?;
        expense_views(&self.db, ctx.flat_id, &period, &names).await
    }

    /// A single expense of the actor's flat.
    pub async fn get_expense(&self, ctx: AuthContext, expense_id: i64) -> Result<ExpenseView> {
        auth::require(&self.authorizer, &ctx, Capability::ViewExpenses)?;

        let expense = ledger::find_expense(&self.db, ctx.flat_id, expense_id)
            .await?
            .ok_or_else(|| Error::not_found("expense", expense_id))?;
        let names = members::member_names(&self.db, ctx.flat_id).await?;
        Ok(ExpenseView::new(&expense, name_of(&names, expense.payer_id)))
    }

    /// Sets a member's participation in one month.
    #[instrument(skip(self))]
    pub async fn set_member_month_status(
        &self,
        ctx: AuthContext,
        member_id: i64,
        year: i32,
        month: u32,
        update: MonthStatusUpdate,
    ) -> Result<member_month_status::Model> {
        auth::require(&self.authorizer, &ctx, Capability::ManageMembers)?;
        let period = MonthPeriod::new(year, month)?;

        let update = &update;
        let status = self
            .retrying("set_member_month_status", move || async move {
                let txn = self.db.begin().await?;
                let (status, _) =
                    members::set_month_status(&txn, ctx.flat_id, member_id, &period, update.clone())
                        .await?;
                activity::record(
                    &txn,
                    &ctx,
                    ActivityAction::MemberStatus,
                    format!(
                        "Member #{member_id} {} in {period}",
                        if status.is_active { "active" } else { "inactive" }
                    ),
                    json!({
                        "member_id": member_id,
                        "year": period.year(),
                        "month": period.month(),
                        "is_active": status.is_active,
                        "active_from": status.active_from,
                        "active_until": status.active_until,
                    }),
                )
                .await?;
                txn.commit().await?;
                Ok(status)
            })
            .await?;

        info!(flat_id = ctx.flat_id, member_id, %period, is_active = status.is_active, "Member month status saved");
        Ok(status)
    }

    /// Latest activity of the actor's flat, newest first.
    pub async fn recent_activity(
        &self,
        ctx: AuthContext,
        limit: u64,
    ) -> Result<Vec<activity_log::Model>> {
        auth::require(&self.authorizer, &ctx, Capability::ViewMeals)?;
        activity::recent_activity(&self.db, ctx.flat_id, limit).await
    }

    async fn retrying<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_retryable() && retries < self.settings.conflict_retries => {
                    retries += 1;
                    warn!(operation, retries, error = %err, "Transaction conflict, retrying");
                }
                result => return result,
            }
        }
    }
}

/// Recalculates a month and computes balances at the new rate.
async fn refresh_month<C>(
    db: &C,
    flat_id: i64,
    period: &MonthPeriod,
) -> Result<(MonthSummary, Vec<MemberBalance>)>
where
    C: ConnectionTrait,
{
    let row = aggregation::recalculate_month(db, flat_id, period).await?;
    let summary = MonthSummary::from_row(&row, period);
    let balances = balance::balances_at_rate(db, flat_id, period, summary.meal_rate).await?;
    Ok((summary, balances))
}

async fn expense_views<C>(
    db: &C,
    flat_id: i64,
    period: &MonthPeriod,
    names: &HashMap<i64, String>,
) -> Result<Vec<ExpenseView>>
where
    C: ConnectionTrait,
{
    Ok(ledger::expenses_in_period(db, flat_id, period)
        .await?
        .iter()
        .map(|expense| ExpenseView::new(expense, name_of(names, expense.payer_id)))
        .collect())
}

fn name_of(names: &HashMap<i64, String>, member_id: i64) -> String {
    names.get(&member_id).cloned().unwrap_or_default()
}

fn ensure_member_active(member: &membership::Model) -> Result<()> {
    if member.is_active {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "{} is not an active member",
            member.display_name
        )))
    }
}

fn validate_expense(input: &ExpenseInput) -> Result<ExpenseFields> {
    let description = input.description.trim();
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(Error::invalid(format!(
            "Description is longer than {MAX_DESCRIPTION_CHARS} characters"
        )));
    }

    Ok(ExpenseFields {
        payer_id: input.payer_id,
        amount_cents: amount::amount_to_cents(input.amount)?,
        description: description.to_string(),
        date: input.date,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{core::auth::RoleTable, test_utils::*};
    use rust_decimal_macros::dec;
    use crate::entities::monthly_summary;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};

    fn meal(member_id: i64, date: NaiveDate, meal_count: Decimal) -> MealCellInput {
        MealCellInput {
            member_id,
            date,
            meal_count,
        }
    }

    fn expense(payer_id: i64, amount: Decimal, date: NaiveDate) -> ExpenseInput {
        ExpenseInput {
            payer_id,
            amount,
            description: "Groceries".to_string(),
            date,
        }
    }

    #[tokio::test]
    async fn test_two_member_month() -> Result<()> {
        let (gateway, flat, alice, bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);
        let feb1 = day(2026, 2, 1);

        gateway.upsert_meal_cell(ctx, meal(alice.id, feb1, dec!(2))).await?;
        gateway.upsert_meal_cell(ctx, meal(bob.id, feb1, dec!(1))).await?;
        let change = gateway
            .create_expense(ctx, expense(alice.id, dec!(300.00), feb1))
            .await?;
        assert_eq!(change.summary.meal_rate, dec!(100.00));

        let report = gateway.month_summary(ctx, 2026, 2).await?;
        assert_eq!(report.summary.total_meals, dec!(3));
        assert_eq!(report.summary.total_expense, dec!(300.00));
        assert_eq!(report.summary.meal_rate, dec!(100.00));
        assert_eq!(report.balances[0].balance, dec!(100.00));
        assert_eq!(report.balances[1].balance, dec!(-100.00));

        Ok(())
    }

    #[tokio::test]
    async fn test_meal_cell_is_upserted() -> Result<()> {
        let (gateway, flat, alice, _bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);

        let first = gateway
            .upsert_meal_cell(ctx, meal(alice.id, day(2026, 2, 4), dec!(1)))
            .await?;
        let second = gateway
            .upsert_meal_cell(ctx, meal(alice.id, day(2026, 2, 4), dec!(2.5)))
            .await?;

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.entry.id, second.entry.id);
        assert_eq!(second.summary.total_meals, dec!(2.5));
        assert_eq!(second.balances.len(), 2);

        let activity = gateway.recent_activity(ctx, 10).await?;
        assert_eq!(activity[0].action, "meal_update");
        assert_eq!(activity[1].action, "meal_add");

        Ok(())
    }

    #[tokio::test]
    async fn test_half_meal_round_trips_through_grid() -> Result<()> {
        let (gateway, flat, alice, _bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);

        gateway
            .upsert_meal_cell(ctx, meal(alice.id, day(2026, 2, 9), dec!(1.5)))
            .await?;
        for _ in 0..3 {
            gateway.month_summary(ctx, 2026, 2).await?;
        }

        let grid = gateway.month_grid(ctx, 2026, 2).await?;
        assert_eq!(grid.meals.len(), 1);
        assert_eq!(grid.meals[0].meal_count, dec!(1.5));
        assert_eq!(grid.meals[0].meal_count.to_string(), "1.5");

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_meal_counts_are_rejected() -> Result<()> {
        let (gateway, flat, alice, _bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);

        for bad in [dec!(-1), dec!(0.3), dec!(1000)] {
            let result = gateway
                .upsert_meal_cell(ctx, meal(alice.id, day(2026, 2, 1), bad))
                .await;
            assert!(matches!(result, Err(Error::InvalidInput { .. })), "{bad}");
        }
        let out_of_range = gateway
            .upsert_meal_cell(ctx, meal(alice.id, day(2019, 12, 31), dec!(1)))
            .await;
        assert!(matches!(out_of_range, Err(Error::InvalidInput { .. })));

        // nothing was written, not even a summary row
        assert!(summary::find_row(gateway.db(), flat.id, &MonthPeriod::new(2026, 2)?)
            .await?
            .is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_locked_month_rejects_meals() -> Result<()> {
        let (gateway, flat, alice, _bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);

        gateway
            .upsert_meal_cell(ctx, meal(alice.id, day(2026, 2, 1), dec!(2)))
            .await?;
        let locked = gateway.lock_month(ctx, 2026, 2).await?;
        assert!(locked.is_locked);
        assert_eq!(locked.locked_by, Some(alice.id));

        let rejected = gateway
            .upsert_meal_cell(ctx, meal(alice.id, day(2026, 2, 14), dec!(1)))
            .await;
        assert!(matches!(
            rejected,
            Err(Error::MonthLocked { year: 2026, month: 2 })
        ));

        let report = gateway.month_summary(ctx, 2026, 2).await?;
        assert_eq!(report.summary.total_meals, dec!(2));
        assert!(report.summary.is_locked);

        // March is unaffected
        gateway
            .upsert_meal_cell(ctx, meal(alice.id, day(2026, 3, 1), dec!(1)))
            .await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_unlock_restores_mutability() -> Result<()> {
        let (gateway, flat, alice, _bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);

        gateway
            .upsert_meal_cell(ctx, meal(alice.id, day(2026, 2, 1), dec!(2)))
            .await?;
        gateway
            .create_expense(ctx, expense(alice.id, dec!(50.00), day(2026, 2, 1)))
            .await?;
        let locked = gateway.lock_month(ctx, 2026, 2).await?;

        let unlocked = gateway.unlock_month(ctx, 2026, 2).await?;
        assert!(!unlocked.is_locked);
        assert_eq!(unlocked.locked_by, None);
        assert_eq!(unlocked.locked_at, None);
        assert_eq!(unlocked.total_meals, locked.total_meals);
        assert_eq!(unlocked.total_expense, locked.total_expense);
        assert_eq!(unlocked.meal_rate, locked.meal_rate);

        gateway
            .upsert_meal_cell(ctx, meal(alice.id, day(2026, 2, 2), dec!(1)))
            .await?;

        // a second unlock is a no-op
        let again = gateway.unlock_month(ctx, 2026, 2).await?;
        assert!(!again.is_locked);

        Ok(())
    }

    #[tokio::test]
    async fn test_unlock_uninitialized_month_creates_nothing() -> Result<()> {
        let (gateway, flat, alice, _bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);

        let summary = gateway.unlock_month(ctx, 2026, 5).await?;
        assert_eq!(summary, MonthSummary::empty(flat.id, &MonthPeriod::new(2026, 5)?));
        assert!(summary::find_row(gateway.db(), flat.id, &MonthPeriod::new(2026, 5)?)
            .await?
            .is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_relock_restamps_actor() -> Result<()> {
        let (gateway, flat, alice, bob) = setup_gateway_with(|table, flat, _alice, bob| {
            table.grant(flat.id, bob.id, [Capability::CloseMonth]);
        })
        .await?;

        gateway.lock_month(ctx_for(&flat, &alice), 2026, 2).await?;
        let relocked = gateway.lock_month(ctx_for(&flat, &bob), 2026, 2).await?;
        assert!(relocked.is_locked);
        assert_eq!(relocked.locked_by, Some(bob.id));

        Ok(())
    }

    #[tokio::test]
    async fn test_locked_month_rejects_expenses_by_default() -> Result<()> {
        let (gateway, flat, alice, _bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);

        let created = gateway
            .create_expense(ctx, expense(alice.id, dec!(10.00), day(2026, 2, 3)))
            .await?;
        gateway.lock_month(ctx, 2026, 2).await?;

        assert!(matches!(
            gateway
                .create_expense(ctx, expense(alice.id, dec!(5.00), day(2026, 2, 3)))
                .await,
            Err(Error::MonthLocked { .. })
        ));
        assert!(matches!(
            gateway.delete_expense(ctx, created.expense.id).await,
            Err(Error::MonthLocked { .. })
        ));
        // moving an expense out of a locked month is rejected too
        assert!(matches!(
            gateway
                .update_expense(
                    ctx,
                    created.expense.id,
                    expense(alice.id, dec!(10.00), day(2026, 3, 3))
                )
                .await,
            Err(Error::MonthLocked { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_expense_lock_can_be_disabled() -> Result<()> {
        let settings = LedgerSettings {
            lock_expenses: false,
            ..LedgerSettings::default()
        };
        let (db, flat, alice, bob) = setup_with_flat().await?;
        let gateway = MutationGateway::new(db, full_access(&flat, &[&alice, &bob]), settings);
        let ctx = ctx_for(&flat, &alice);

        gateway.lock_month(ctx, 2026, 2).await?;
        let change = gateway
            .create_expense(ctx, expense(alice.id, dec!(12.50), day(2026, 2, 3)))
            .await?;
        assert_eq!(change.summary.total_expense, dec!(12.50));
        assert!(change.summary.is_locked);

        assert!(matches!(
            gateway
                .upsert_meal_cell(ctx, meal(alice.id, day(2026, 2, 3), dec!(1)))
                .await,
            Err(Error::MonthLocked { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_uses_entry_date() -> Result<()> {
        let (gateway, flat, alice, _bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);

        gateway
            .upsert_meal_cell(ctx, meal(alice.id, day(2025, 11, 10), dec!(2)))
            .await?;
        let created = gateway
            .create_expense(ctx, expense(alice.id, dec!(80.00), day(2025, 11, 10)))
            .await?;
        assert_eq!(created.summary.meal_rate, dec!(40.00));

        let deletion = gateway.delete_expense(ctx, created.expense.id).await?;
        assert_eq!(deletion.summary.year, 2025);
        assert_eq!(deletion.summary.month, 11);
        assert_eq!(deletion.summary.total_expense, dec!(0));
        assert_eq!(deletion.summary.meal_rate, dec!(0));
        assert_eq!(deletion.expense.amount, dec!(80.00));

        assert!(matches!(
            gateway.delete_expense(ctx, created.expense.id).await,
            Err(Error::NotFound { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_moving_months_recalculates_both() -> Result<()> {
        let (gateway, flat, alice, _bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);

        let created = gateway
            .create_expense(ctx, expense(alice.id, dec!(40.00), day(2026, 1, 31)))
            .await?;
        let change = gateway
            .update_expense(
                ctx,
                created.expense.id,
                ExpenseInput {
                    description: "  Moved  ".to_string(),
                    ..expense(alice.id, dec!(45.00), day(2026, 2, 1))
                },
            )
            .await?;

        assert_eq!(change.expense.description, "Moved");
        assert_eq!(change.summary.month, 2);
        assert_eq!(change.summary.total_expense, dec!(45.00));
        let previous = change.previous_summary.unwrap();
        assert_eq!(previous.month, 1);
        assert_eq!(previous.total_expense, dec!(0));

        let same_month = gateway
            .update_expense(
                ctx,
                created.expense.id,
                expense(alice.id, dec!(50.00), day(2026, 2, 2)),
            )
            .await?;
        assert!(same_month.previous_summary.is_none());
        assert_eq!(same_month.summary.total_expense, dec!(50.00));

        Ok(())
    }

    #[tokio::test]
    async fn test_expense_validation() -> Result<()> {
        let (gateway, flat, alice, _bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);
        let date = day(2026, 2, 1);

        for bad in [dec!(-0.01), dec!(1.005), dec!(10000000000.00)] {
            assert!(matches!(
                gateway.create_expense(ctx, expense(alice.id, bad, date)).await,
                Err(Error::InvalidInput { .. })
            ));
        }
        let long = ExpenseInput {
            description: "x".repeat(MAX_DESCRIPTION_CHARS + 1),
            ..expense(alice.id, dec!(1), date)
        };
        assert!(matches!(
            gateway.create_expense(ctx, long).await,
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            gateway.create_expense(ctx, expense(9_999, dec!(1), date)).await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            gateway
                .update_expense(ctx, 9_999, expense(alice.id, dec!(1), date))
                .await,
            Err(Error::NotFound { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_inactive_member_gets_no_new_rows() -> Result<()> {
        let (gateway, flat, alice, bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);

        members::set_member_active(gateway.db(), bob.clone(), false).await?;

        assert!(matches!(
            gateway
                .upsert_meal_cell(ctx, meal(bob.id, day(2026, 2, 1), dec!(1)))
                .await,
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            gateway
                .create_expense(ctx, expense(bob.id, dec!(1), day(2026, 2, 1)))
                .await,
            Err(Error::InvalidInput { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_capabilities_are_enforced() -> Result<()> {
        let (gateway, flat, alice, bob) = setup_gateway().await?;
        let bob_ctx = ctx_for(&flat, &bob);

        // members may write their own meals
        gateway
            .upsert_meal_cell(bob_ctx, meal(bob.id, day(2026, 2, 1), dec!(1)))
            .await?;

        let for_alice = gateway
            .upsert_meal_cell(bob_ctx, meal(alice.id, day(2026, 2, 1), dec!(1)))
            .await;
        assert!(matches!(
            for_alice,
            Err(Error::Forbidden {
                capability: "edit_other_users"
            })
        ));
        assert!(matches!(
            gateway.lock_month(bob_ctx, 2026, 2).await,
            Err(Error::Forbidden {
                capability: "close_month"
            })
        ));
        assert!(matches!(
            gateway
                .set_member_month_status(bob_ctx, bob.id, 2026, 2, MonthStatusUpdate::default())
                .await,
            Err(Error::Forbidden {
                capability: "manage_members"
            })
        ));

        let alice_expense = gateway
            .create_expense(
                ctx_for(&flat, &alice),
                expense(alice.id, dec!(20.00), day(2026, 2, 1)),
            )
            .await?;
        assert!(matches!(
            gateway.delete_expense(bob_ctx, alice_expense.expense.id).await,
            Err(Error::Forbidden { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_other_flats_are_invisible() -> Result<()> {
        let (gateway, flat, alice, _bob) = setup_gateway().await?;
        let other = create_test_flat(gateway.db(), "Other", "guild-other").await?;
        let stranger =
            members::add_member(gateway.db(), other.id, "user-s", "Stranger", "owner").await?;

        let created = gateway
            .create_expense(
                ctx_for(&flat, &alice),
                expense(alice.id, dec!(20.00), day(2026, 2, 1)),
            )
            .await?;

        let mut table = RoleTable::default();
        table.grant(other.id, stranger.id, Capability::ALL);
        let other_gateway =
            MutationGateway::new(gateway.into_db(), table, LedgerSettings::default());
        let stranger_ctx = ctx_for(&other, &stranger);

        assert!(matches!(
            other_gateway.get_expense(stranger_ctx, created.expense.id).await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            other_gateway
                .upsert_meal_cell(stranger_ctx, meal(alice.id, day(2026, 2, 1), dec!(1)))
                .await,
            Err(Error::NotFound { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_member_month_status_changes_balances() -> Result<()> {
        let (gateway, flat, alice, bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);

        let status = gateway
            .set_member_month_status(
                ctx,
                bob.id,
                2026,
                2,
                MonthStatusUpdate {
                    is_active: false,
                    note: "Away".to_string(),
                    ..Default::default()
                },
            )
            .await?;
        assert!(!status.is_active);

        let report = gateway.month_summary(ctx, 2026, 2).await?;
        assert_eq!(report.balances.len(), 1);
        assert_eq!(report.balances[0].member_id, alice.id);

        let activity = gateway.recent_activity(ctx, 1).await?;
        assert_eq!(activity[0].action, "member_status");

        Ok(())
    }

    #[tokio::test]
    async fn test_grid_orders_meals_and_lists_expenses() -> Result<()> {
        let (gateway, flat, alice, bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);

        gateway
            .upsert_meal_cell(ctx, meal(bob.id, day(2026, 2, 2), dec!(1)))
            .await?;
        gateway
            .upsert_meal_cell(ctx, meal(alice.id, day(2026, 2, 2), dec!(1)))
            .await?;
        gateway
            .upsert_meal_cell(ctx, meal(bob.id, day(2026, 2, 1), dec!(1)))
            .await?;
        let older = gateway
            .create_expense(ctx, expense(alice.id, dec!(10.00), day(2026, 2, 1)))
            .await?;
        let newer = gateway
            .create_expense(ctx, expense(bob.id, dec!(20.00), day(2026, 2, 5)))
            .await?;

        let grid = gateway.month_grid(ctx, 2026, 2).await?;
        let cells: Vec<(u32, &str)> = grid
            .meals
            .iter()
            .map(|m| (chrono::Datelike::day(&m.date), m.member_name.as_str()))
            .collect();
        assert_eq!(cells, vec![(1, "Bob"), (2, "Alice"), (2, "Bob")]);

        let ids: Vec<i64> = grid.expenses.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![newer.expense.id, older.expense.id]);
        assert_eq!(grid.expenses[0].payer_name, "Bob");
        assert_eq!(grid.summary.total_expense, dec!(30.00));
        assert_eq!(gateway.list_expenses(ctx, 2026, 2).await?.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_writers_lose_no_update() -> Result<()> {
        let (gateway, flat, alice, bob) = setup_gateway().await?;
        let ctx = ctx_for(&flat, &alice);

        let (a, b, c) = tokio::join!(
            gateway.upsert_meal_cell(ctx, meal(alice.id, day(2026, 2, 1), dec!(2))),
            gateway.upsert_meal_cell(ctx, meal(bob.id, day(2026, 2, 1), dec!(1))),
            gateway.create_expense(ctx, expense(alice.id, dec!(300.00), day(2026, 2, 1))),
        );
        a?;
        b?;
        c?;

        let report = gateway.month_summary(ctx, 2026, 2).await?;
        assert_eq!(report.summary.total_meals, dec!(3));
        assert_eq!(report.summary.total_expense, dec!(300.00));
        assert_eq!(report.summary.meal_rate, dec!(100.00));

        Ok(())
    }

    #[tokio::test]
    async fn test_empty_month_reads_as_zero() -> Result<()> {
        let (gateway, flat, alice, _bob) = setup_gateway().await?;

        let report = gateway.month_summary(ctx_for(&flat, &alice), 2026, 7).await?;
        assert_eq!(report.summary.meal_rate, dec!(0));
        assert_eq!(report.summary.total_meals, dec!(0));
        assert!(report.balances.iter().all(|b| b.balance.is_zero()));

        Ok(())
    }

    fn mock_gateway(db: MockDatabase, conflict_retries: u32) -> TestGateway {
        let mut table = RoleTable::default();
        table.grant(1, 1, Capability::ALL);
        let settings = LedgerSettings {
            conflict_retries,
            ..LedgerSettings::default()
        };
        MutationGateway::new(db.into_connection(), table, settings)
    }

    fn busy() -> DbErr {
        DbErr::Custom("database is locked".to_string())
    }

    #[tokio::test]
    async fn test_rejected_input_touches_no_store() -> Result<()> {
        let gateway = mock_gateway(MockDatabase::new(DatabaseBackend::Sqlite), 3);
        let ctx = AuthContext::new(1, 1);

        let result = gateway
            .upsert_meal_cell(ctx, meal(1, day(2026, 2, 1), dec!(1.2)))
            .await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));

        let result = gateway
            .upsert_meal_cell(ctx, meal(1, day(2026, 2, 1), Decimal::MAX))
            .await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));

        let result = gateway
            .create_expense(ctx, expense(1, dec!(-5.00), day(2026, 2, 1)))
            .await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));

        let result = gateway.lock_month(ctx, 2026, 13).await;
        assert!(matches!(result, Err(Error::InvalidInput { .. })));

        let result = gateway.month_summary(AuthContext::new(1, 2), 2026, 2).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        assert!(gateway.into_db().into_transaction_log().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_conflict_is_retried_until_it_clears() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_errors([busy()])
            .append_query_results([Vec::<monthly_summary::Model>::new()]);
        let gateway = mock_gateway(db, 3);
        let period = MonthPeriod::new(2026, 2)?;

        let summary = gateway.unlock_month(AuthContext::new(1, 1), 2026, 2).await?;
        assert_eq!(summary, MonthSummary::empty(1, &period));

        Ok(())
    }

    #[tokio::test]
    async fn test_conflict_surfaces_after_retries_run_out() -> Result<()> {
        // three failing attempts, then a result that only a fourth attempt would see
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_errors([busy(), busy(), busy()])
            .append_query_results([Vec::<monthly_summary::Model>::new()]);
        let gateway = mock_gateway(db, 2);
        let period = MonthPeriod::new(2026, 2)?;

        let result = gateway.unlock_month(AuthContext::new(1, 1), 2026, 2).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        // exactly three attempts ran, so the queued result is still there
        assert!(summary::find_row(gateway.db(), 1, &period).await?.is_none());

        Ok(())
    }
}
