//! Discord interaction handlers
//!
//! Handlers for interactions other than commands, currently autocomplete.

/// Autocomplete handlers for member names
pub mod autocomplete;
