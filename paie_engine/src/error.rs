//! Error types for the Paie Engine.
//!
//! The calculation core never fails on numeric edge cases; errors only
//! arise at the edges: loading configuration, resolving a fiscal year,
//! or editing a payslip that has already been finalized.

use thiserror::Error;

/// Convenience alias used across the library.
pub type PayrollResult<T> = Result<T, PayrollError>;

#[derive(Debug, Error)]
pub enum PayrollError {
    /// A contribution definition was rejected while loading a catalog.
    #[error("invalid contribution definition `{id}`: {reason}")]
    InvalidDefinition { id: String, reason: String },

    /// The payslip has been locked and can no longer be edited.
    #[error("payslip for period starting {0} is locked")]
    Locked(chrono::NaiveDate),

    #[error("no salary line item at index {0}")]
    UnknownLineItem(usize),

    #[error("no pay period at index {0}")]
    UnknownPeriod(usize),

    #[error("no contribution with id `{0}` on this payslip")]
    UnknownContribution(String),

    #[error("no parameters registered for fiscal year {0}")]
    UnknownFiscalYear(i32),

    /// A period was pushed into a ledger that tracks another fiscal year.
    #[error("period belongs to fiscal year {found}, ledger tracks {expected}")]
    FiscalYearMismatch { expected: i32, found: i32 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
