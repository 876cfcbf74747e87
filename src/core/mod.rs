//! Core ledger logic, independent of the Discord surface.
//!
//! Everything that changes ledger state goes through [`gateway::MutationGateway`];
//! the other modules hold the queries and pure calculations it composes.

/// Append-only activity log
pub mod activity;
/// Aggregated meal and expense totals per flat-month
pub mod aggregation;
/// Conversion between decimal amounts and stored integer units
pub mod amount;
/// Capabilities and the authorizer seam
pub mod auth;
/// Per-member balances
pub mod balance;
/// Flats and their guild binding
pub mod flat;
/// The single entry point for ledger mutations and month reads
pub mod gateway;
/// Meal and expense row persistence
pub mod ledger;
/// Memberships and per-month participation
pub mod members;
/// Calendar month handling
pub mod period;
/// Plain-text rendering of summaries, balances and grids
pub mod report;
/// Monthly summary rows, recalculation and locking
pub mod summary;
