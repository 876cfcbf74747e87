//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Expense commands
pub mod expense;

/// General utility commands
pub mod general;

/// Meal cell command
pub mod meal;

/// Month summary, grid, lock and member status commands
pub mod month;

// Export commands
pub use expense::*;
pub use general::*;
pub use meal::*;
pub use month::*;
