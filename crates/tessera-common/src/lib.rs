//! # Tessera Common
//!
//! Shared types and errors for the Tessera collateralized lending engine.
//!
//! ## Core Types
//!
//! - [`ResourceId`]/[`AccountId`]: opaque identifiers for unique resources and accounts
//! - [`LoanId`]/[`LockId`]: engine-issued identifiers for loans and collateral locks
//! - [`ReputationScore`]: bounded trust score read from an external source
//! - [`EscrowAccount`]: available/locked balance bookkeeping for settlement
//! - [`LendingError`]: the typed failure surface of every engine operation

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{LendingError, Result};
pub use types::{
    escrow::{EscrowAccount, EscrowError},
    ids::{AccountId, LoanId, LockId, ResourceId},
    reputation::ReputationScore,
};

/// Tessera version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Seconds in a (non-leap) year, the accrual denominator
pub const SECONDS_PER_YEAR: i64 = 31_536_000;

/// Basis points in 100%
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Upper bound of a utilization percentage
pub const MAX_UTILIZATION: u8 = 100;

/// Default upper bound of the reputation scale
pub const DEFAULT_MAX_SCORE: u16 = 100;
