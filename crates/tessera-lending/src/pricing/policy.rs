//! Reputation coupling policy
//!
//! How a trust score turns into a risk factor is a policy decision, so it
//! sits behind [`RiskPolicy`]. Whatever the policy, the same factor feeds the
//! rate and the collateral requirement.

use tessera_common::{ReputationScore, BPS_DENOMINATOR};

use crate::config::PricingConfig;

pub trait RiskPolicy: Send + Sync {
    /// Risk factor in basis points for a borrower's score
    fn reputation_factor_bps(&self, score: ReputationScore, config: &PricingConfig) -> u32;

    /// Collateral multiplier in basis points for a risk factor (10_000 = 1x)
    fn collateral_multiplier_bps(&self, factor_bps: u32) -> u32 {
        BPS_DENOMINATOR.saturating_add(factor_bps)
    }
}

/// Factor grows linearly with the distance below the top of the scale
///
/// ```text
/// factor = (MAX_SCORE - score) × sensitivity / MAX_SCORE
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearReputationPolicy;

impl RiskPolicy for LinearReputationPolicy {
    fn reputation_factor_bps(&self, score: ReputationScore, config: &PricingConfig) -> u32 {
        if score.max == 0 {
            return 0;
        }
        let factor = u64::from(score.deficit()) * u64::from(config.reputation_sensitivity_bps)
            / u64::from(score.max);
        u32::try_from(factor).unwrap_or(u32::MAX)
    }
}
