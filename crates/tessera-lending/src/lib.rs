//! # Tessera Lending
//!
//! Collateralized lending engine for unique, indivisible resources.
//!
//! ## Pricing Formula
//!
//! ```text
//! rate       = clamp(base + utilization premium + reputation factor, MIN, MAX)
//! collateral = principal × base ratio × (1 + reputation factor), clamped
//! interest   = principal × origination rate × elapsed / year
//! ```
//!
//! Low reputation raises the rate and the collateral together, so a borrower
//! cannot buy a better rate by over-collateralizing.
//!
//! ## Components
//!
//! - [`AssetRegistry`]: custody of deposited resources, O(1) pool counters
//! - [`ReputationAdapter`]: read-only view over an external trust score
//! - [`PricingEngine`]: utilization and reputation adjusted loan terms
//! - [`LoanLedger`]: borrow/return state machine
//! - [`LiquidationManager`]: pull-based settlement of overdue loans
//! - [`FeeSplitter`]: lender/platform split of accrued interest
//! - [`LendingEngine`]: the public API surface tying them together

pub mod clock;
pub mod config;
pub mod engine;
pub mod fees;
pub mod ledger;
pub mod liquidation;
pub mod oracle;
pub mod pricing;
pub mod registry;
pub mod reputation;
pub mod settlement;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, LendingConfig, PricingConfig};
pub use engine::{LendingEngine, LendingEngineBuilder};
pub use fees::{FeeSplit, FeeSplitter};
pub use ledger::{BorrowRequest, Loan, LoanLedger, LoanStatus, ReturnReceipt};
pub use liquidation::{LiquidationManager, LiquidationReceipt};
pub use oracle::{StaticValueOracle, ValueOracle};
pub use pricing::{LinearReputationPolicy, PricingEngine, Quote, QuoteBreakdown, RiskPolicy};
pub use registry::{AssetRegistry, CustodyState, PoolStats, ResourceRecord};
pub use reputation::{InMemoryReputation, ReputationAdapter, ReputationView};
pub use settlement::{InMemorySettlement, SettlementLedger};

pub use tessera_common::{AccountId, LendingError, LoanId, LockId, ResourceId, Result};
