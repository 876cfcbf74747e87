//! Unified error type for `FlatLedger`.
//!
//! Every layer (core, config, bot) returns [`Error`]. The first group of variants is
//! the ledger's own taxonomy; the rest wrap infrastructure failures.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range input, rejected before any write.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// What was wrong with the input
        message: String,
    },

    /// The referenced entry, member or flat does not exist in the caller's scope.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up (e.g. `"expense"`)
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// A write targeted a month that has been locked.
    #[error("Month {year}-{month:02} is locked")]
    MonthLocked {
        /// Year of the locked month
        year: i32,
        /// Month (1-12) of the locked month
        month: u32,
    },

    /// Concurrent transactions collided on the same flat-month; safe to retry.
    #[error("Conflicting concurrent update: {message}")]
    Conflict {
        /// Store message describing the conflict
        message: String,
    },

    /// The actor lacks the capability required for the operation.
    #[error("Missing capability `{capability}`")]
    Forbidden {
        /// Codename of the missing capability
        capability: &'static str,
    },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// Any store error that is not a concurrency conflict
    #[error("Database error: {0}")]
    Database(DbErr),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Error while rendering text output
    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    /// Integer did not fit the target type
    #[error("Integer conversion error: {0}")]
    TryFromInt(#[from] std::num::TryFromIntError),

    /// Discord client failure
    #[error("Serenity/Poise framework error: {0}")]
    Framework(Box<poise::serenity_prelude::Error>),
}

impl Error {
    /// Shorthand for an [`Error::InvalidInput`] with the given message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Shorthand for an [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether re-running the whole operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<DbErr> for Error {
    fn from(value: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(message)) = value.sql_err() {
            return Self::Conflict { message };
        }

        let text = value.to_string();
        let lowered = text.to_lowercase();
        if lowered.contains("database is locked")
            || lowered.contains("could not serialize")
            || lowered.contains("deadlock")
        {
            return Self::Conflict { message: text };
        }

        Self::Database(value)
    }
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Framework(Box::new(value))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
