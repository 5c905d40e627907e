//! Error types for the Tessera lending engine
//!
//! Every operation returns a typed [`LendingError`]. Validation failures are
//! raised before any record is touched, so an `Err` from a state-changing
//! call means nothing changed unless the variant says otherwise.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::escrow::EscrowError;

/// Result type alias using LendingError
pub type Result<T> = std::result::Result<T, LendingError>;

/// Unified error type for lending operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LendingError {
    // Lookup errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Resource already registered: {0}")]
    AlreadyRegistered(String),

    // Authorization errors
    #[error("Caller {caller} is not the depositor of {resource}")]
    NotOwner { caller: String, resource: String },

    #[error("Caller {caller} is not the borrower of {resource}")]
    NotBorrower { caller: String, resource: String },

    // Lifecycle errors
    #[error("Resource is still on loan: {0}")]
    StillOnLoan(String),

    #[error("Invalid state: expected {expected}, found {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("Insufficient collateral: required {required}, provided {provided}")]
    InsufficientCollateral { required: Decimal, provided: Decimal },

    #[error("Loan deadline not reached: due at {deadline}, now {now}")]
    DeadlineNotReached { deadline: i64, now: i64 },

    #[error("Loan deadline passed: due at {deadline}, now {now}")]
    DeadlinePassed { deadline: i64, now: i64 },

    // Numeric errors
    #[error("Value out of bounds: {0}")]
    ArithmeticBounds(String),

    // Collaborator errors
    #[error("Escrow error: {0}")]
    Escrow(#[from] EscrowError),

    #[error("Settlement error: {0}")]
    Settlement(String),

    #[error("Value oracle error: {0}")]
    Oracle(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LendingError {
    pub fn invalid_state(expected: impl ToString, actual: impl ToString) -> Self {
        LendingError::InvalidState {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn bounds(reason: impl Into<String>) -> Self {
        LendingError::ArithmeticBounds(reason.into())
    }
}

impl From<serde_json::Error> for LendingError {
    fn from(err: serde_json::Error) -> Self {
        LendingError::Config(err.to_string())
    }
}

impl From<anyhow::Error> for LendingError {
    fn from(err: anyhow::Error) -> Self {
        LendingError::Config(err.to_string())
    }
}
