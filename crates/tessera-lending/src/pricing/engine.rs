//! Dynamic pricing engine
//!
//! ```text
//! premium    = (utilization - target) × multiplier        if above target
//! raw        = min(base + premium, MAX_RATE)
//! rate       = clamp(raw + reputation factor, MIN_RATE, MAX_RATE)
//! collateral = principal × base ratio × (1 + factor), clamped to [min, max] ratio
//! ```
//!
//! The configuration is held as an `Arc` snapshot. A quote reads exactly one
//! snapshot and records its version, so a concurrent update never produces
//! a quote mixing old and new parameters.

use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tessera_common::{AccountId, LendingError, ReputationScore, Result, BPS_DENOMINATOR};
use tracing::{debug, info, instrument};

use crate::config::PricingConfig;
use crate::pricing::policy::{LinearReputationPolicy, RiskPolicy};
use crate::registry::AssetRegistry;
use crate::reputation::{ReputationAdapter, ReputationView};

/// Loan terms offered to a borrower
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Annual rate in basis points, locked in if the loan is taken
    pub rate_bps: u32,
    /// Minimum collateral the borrower must lock
    pub collateral: Decimal,
    /// Principal value the terms were computed for
    pub principal: Decimal,
    /// How the terms were derived
    pub breakdown: QuoteBreakdown,
    /// Version of the pricing snapshot used
    pub config_version: u64,
}

/// Components of a quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteBreakdown {
    pub utilization: u8,
    pub base_rate_bps: u32,
    pub utilization_premium_bps: u32,
    /// Base plus premium, capped at the max rate
    pub raw_rate_bps: u32,
    pub reputation_factor_bps: u32,
    pub collateral_multiplier_bps: u32,
    pub score: ReputationScore,
}

pub struct PricingEngine {
    config: RwLock<Arc<PricingConfig>>,
    registry: Arc<AssetRegistry>,
    reputation: ReputationAdapter,
    policy: Arc<dyn RiskPolicy>,
}

impl PricingEngine {
    pub fn new(
        config: PricingConfig,
        registry: Arc<AssetRegistry>,
        reputation: Arc<dyn ReputationView>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: RwLock::new(Arc::new(config)),
            registry,
            reputation: ReputationAdapter::new(reputation),
            policy: Arc::new(LinearReputationPolicy),
        })
    }

    /// Replace the reputation coupling policy
    pub fn with_policy(mut self, policy: Arc<dyn RiskPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Current configuration snapshot
    pub fn config(&self) -> Arc<PricingConfig> {
        self.config.read().clone()
    }

    /// Install a new configuration snapshot, returning it with its new version
    ///
    /// The version is assigned here; whatever the caller put in `version` is
    /// ignored. An invalid config leaves the current snapshot in place.
    #[instrument(skip_all)]
    pub fn update_config(&self, mut next: PricingConfig) -> Result<Arc<PricingConfig>> {
        next.validate()?;

        let mut current = self.config.write();
        next.version = current.version + 1;
        let snapshot = Arc::new(next);
        *current = snapshot.clone();

        info!(version = snapshot.version, "Pricing config updated");
        Ok(snapshot)
    }

    /// Pool utilization as a percentage in `[0, 100]`
    pub fn utilization(&self) -> u8 {
        self.registry.utilization()
    }

    /// Quote terms for a borrower against the live pool state
    #[instrument(skip_all, fields(borrower = %borrower, principal = %principal))]
    pub async fn quote(&self, borrower: &AccountId, principal: Decimal) -> Result<Quote> {
        let config = self.config();
        let score = self.reputation.score(borrower, config.max_score).await;
        let utilization = self.utilization();

        let quote = Self::price(&config, self.policy.as_ref(), utilization, score, principal)?;
        debug!(
            rate_bps = quote.rate_bps,
            collateral = %quote.collateral,
            utilization,
            score = score.score,
            "Quote computed"
        );
        Ok(quote)
    }

    /// Pure pricing function over explicit inputs
    pub fn price(
        config: &PricingConfig,
        policy: &dyn RiskPolicy,
        utilization: u8,
        score: ReputationScore,
        principal: Decimal,
    ) -> Result<Quote> {
        if principal <= Decimal::ZERO {
            return Err(LendingError::bounds(format!(
                "principal must be positive, got {}",
                principal
            )));
        }

        let utilization = utilization.min(100);
        let premium = if utilization > config.target_utilization {
            u32::from(utilization - config.target_utilization)
                .saturating_mul(config.utilization_multiplier_bps)
        } else {
            0
        };

        let raw_rate = config
            .base_rate_bps
            .saturating_add(premium)
            .min(config.max_rate_bps);
        let factor = policy.reputation_factor_bps(score, config);
        let rate = raw_rate
            .saturating_add(factor)
            .max(config.min_rate_bps)
            .min(config.max_rate_bps);

        let multiplier = policy.collateral_multiplier_bps(factor);
        let collateral = Self::collateral(config, principal, multiplier)?;

        Ok(Quote {
            rate_bps: rate,
            collateral,
            principal,
            breakdown: QuoteBreakdown {
                utilization,
                base_rate_bps: config.base_rate_bps,
                utilization_premium_bps: premium,
                raw_rate_bps: raw_rate,
                reputation_factor_bps: factor,
                collateral_multiplier_bps: multiplier,
                score,
            },
            config_version: config.version,
        })
    }

    fn collateral(config: &PricingConfig, principal: Decimal, multiplier_bps: u32) -> Result<Decimal> {
        let overflow = || LendingError::bounds("collateral overflow");
        let hundred = Decimal::ONE_HUNDRED;

        let scaled = principal
            .checked_mul(Decimal::from(config.base_collateral_ratio_pct))
            .and_then(|v| v.checked_mul(Decimal::from(multiplier_bps)))
            .ok_or_else(overflow)?;
        let raw = scaled / hundred / Decimal::from(BPS_DENOMINATOR);

        let floor = principal
            .checked_mul(Decimal::from(config.min_collateral_ratio_pct))
            .ok_or_else(overflow)?
            / hundred;
        let ceiling = principal
            .checked_mul(Decimal::from(config.max_collateral_ratio_pct))
            .ok_or_else(overflow)?
            / hundred;

        Ok(raw.max(floor).min(ceiling))
    }
}
