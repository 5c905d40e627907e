//! Pricing module
//!
//! Computes loan terms from:
//! - Pool utilization (premium above a target)
//! - Borrower reputation (risk factor on rate and collateral)
//! - A versioned configuration snapshot

pub mod engine;
pub mod policy;

pub use engine::{PricingEngine, Quote, QuoteBreakdown};
pub use policy::{LinearReputationPolicy, RiskPolicy};
