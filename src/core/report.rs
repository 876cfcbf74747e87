//! Plain-text rendering of month data.
//!
//! Everything here is pure formatting over the gateway's result types; the bot
//! wraps the output in code blocks or embeds.

use crate::{
    core::{
        balance::MemberBalance,
        gateway::{ExpenseView, MonthReport, MonthView},
        summary::MonthSummary,
    },
    errors::Result,
};
use chrono::Datelike;
use rust_decimal::Decimal;
use std::{collections::BTreeMap, fmt::Write};

/// Formats money with two decimals, e.g. `300.00`.
#[must_use]
pub fn format_money(amount: Decimal) -> String {
    format!("{amount:.2}")
}

/// Formats a balance with an explicit sign, e.g. `+100.00` or `-100.00`.
#[must_use]
pub fn format_balance(balance: Decimal) -> String {
    if balance.is_sign_negative() && !balance.is_zero() {
        format!("-{:.2}", balance.abs())
    } else {
        format!("+{balance:.2}")
    }
}

/// Formats a meal count with one decimal, e.g. `1.5`.
#[must_use]
pub fn format_meals(meals: Decimal) -> String {
    format!("{meals:.1}")
}

/// Header line of a month, including lock state.
#[must_use]
pub fn format_summary_line(summary: &MonthSummary) -> String {
    let lock = if summary.is_locked { " [locked]" } else { "" };
    format!(
        "{}-{:02}{lock}: {} meals, {} spent, meal rate {}",
        summary.year,
        summary.month,
        format_meals(summary.total_meals),
        format_money(summary.total_expense),
        format_money(summary.meal_rate),
    )
}

/// One line per member: meals, paid, cost and balance.
pub fn format_balances(balances: &[MemberBalance]) -> Result<String> {
    let width = balances
        .iter()
        .map(|b| b.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(6);

    let mut out = String::new();
    writeln!(
        out,
        "{:<width$} {:>7} {:>12} {:>12} {:>13}",
        "Member", "Meals", "Paid", "Cost", "Balance"
    )?;
    for b in balances {
        writeln!(
            out,
            "{:<width$} {:>7} {:>12} {:>12} {:>13}",
            b.name,
            format_meals(b.total_meals),
            format_money(b.total_paid),
            format_money(b.individual_cost),
            format_balance(b.balance),
        )?;
    }
    Ok(out)
}

/// Summary line followed by the balance table.
pub fn format_month_report(report: &MonthReport) -> Result<String> {
    let mut out = format_summary_line(&report.summary);
    out.push_str("\n\n");
    if report.balances.is_empty() {
        out.push_str("No active members this month.\n");
    } else {
        out.push_str(&format_balances(&report.balances)?);
    }
    Ok(out)
}

/// Single expense, e.g. `#12 2026-02-01 Alice 300.00 Groceries`.
#[must_use]
pub fn format_expense_line(expense: &ExpenseView) -> String {
    let line = format!(
        "#{} {} {} {}",
        expense.id,
        expense.date,
        expense.payer_name,
        format_money(expense.amount)
    );
    if expense.description.is_empty() {
        line
    } else {
        format!("{line} {}", expense.description)
    }
}

/// Meal grid: one row per day that has entries, one column per member.
pub fn format_meal_grid(view: &MonthView) -> Result<String> {
    let mut columns: Vec<(i64, &str)> = view
        .balances
        .iter()
        .map(|b| (b.member_id, b.name.as_str()))
        .collect();
    for entry in &view.meals {
        if !columns.iter().any(|(id, _)| *id == entry.member_id) {
            columns.push((entry.member_id, entry.member_name.as_str()));
        }
    }

    let mut days: BTreeMap<u32, BTreeMap<i64, Decimal>> = BTreeMap::new();
    for entry in &view.meals {
        days.entry(entry.date.day())
            .or_default()
            .insert(entry.member_id, entry.meal_count);
    }

    let mut out = String::new();
    write!(out, "Day")?;
    for (_, name) in &columns {
        write!(out, " {name:>8.8}")?;
    }
    writeln!(out)?;

    for (day, cells) in &days {
        write!(out, "{day:>3}")?;
        for (member_id, _) in &columns {
            let cell = cells
                .get(member_id)
                .map_or_else(|| "-".to_string(), |m| format_meals(*m));
            write!(out, " {cell:>8}")?;
        }
        writeln!(out)?;
    }

    Ok(out)
}
