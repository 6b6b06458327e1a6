//! Error types for the treasury store.
//!
//! Errors are classified by audience:
//! - User-correctable: empty required fields, a fiscal-year gap. The message
//!   is shown to the treasurer as-is and nothing is mutated.
//! - Integrity: schema mismatch, a catalog row missing mid-update. Logged at
//!   error severity; the user sees a generic message.
//! - Storage/environment: SQLite failures, missing home directory.

use thiserror::Error;

use crate::currency::AmountError;

/// Errors surfaced by [`crate::db::TreasuryDb`] and the async facade.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    /// The on-disk table set does not match the fixed schema. Startup-fatal;
    /// the store refuses to operate against a database it does not recognize.
    #[error("Database schema mismatch (missing: [{}], unexpected: [{}])",
            missing.join(", "), unexpected.join(", "))]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// Required form fields arrived empty. Collected across the whole batch so
    /// the treasurer sees every offender at once.
    #[error("These fields need a value before saving: {}", .0.join(", "))]
    EmptyFields(Vec<String>),

    /// The entered year does not adjoin the known fiscal-year chain.
    #[error("Year {entered} is not adjacent to the recorded years {earliest}\u{2013}{latest}; \
             enter years one at a time so no gap forms")]
    FiscalGap {
        entered: i32,
        earliest: i32,
        latest: i32,
    },

    /// No fiscal year has been initialized yet; only an organization save can
    /// create the first one.
    #[error("No fiscal year recorded yet; save the organization details first")]
    NoCurrentYear,

    /// A field-catalog row that should exist was not found mid-operation.
    #[error("Field catalog has no entry for '{0}'")]
    MissingField(String),

    /// The chain should hold this year but does not. Integrity, not input.
    #[error("Fiscal year chain is missing year {0}")]
    MissingYear(i32),

    /// A field query was issued with an empty name set. Caller bug.
    #[error("Field query requires at least one field name")]
    EmptyFieldQuery,

    #[error(transparent)]
    Amount(#[from] AmountError),

    /// A background task hosting a store call failed to complete.
    #[error("Store task failed: {0}")]
    Background(String),
}

impl StoreError {
    /// Whether the treasurer can fix this by correcting their input.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            StoreError::EmptyFields(_)
                | StoreError::FiscalGap { .. }
                | StoreError::NoCurrentYear
                | StoreError::Amount(_)
        )
    }

    /// Message suitable for the status bar. Input errors explain themselves;
    /// everything else maps to a generic developer-contact message.
    pub fn user_message(&self) -> String {
        if self.is_user_correctable() {
            self.to_string()
        } else {
            "Something went wrong while accessing the books. \
             Please contact the developer."
                .to_string()
        }
    }
}
