//! Engine configuration
//!
//! Pricing parameters are an immutable, versioned snapshot. Updating them
//! installs a new snapshot rather than mutating shared globals; loans keep
//! the rate locked at origination regardless of later updates.

use serde::{Deserialize, Serialize};
use tessera_common::{AccountId, LendingError, Result, BPS_DENOMINATOR, DEFAULT_MAX_SCORE};

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rate and collateral curve
    pub pricing: PricingConfig,
    /// Loan terms and fee routing
    pub lending: LendingConfig,
}

impl EngineConfig {
    /// Load configuration from `tessera.toml` (optional) and `TESSERA__*` env vars
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from("tessera")
    }

    /// Load configuration from a named file (extension optional) and the environment
    ///
    /// Environment keys use `__` as the section separator, e.g.
    /// `TESSERA__PRICING__BASE_RATE_BPS=650`.
    pub fn load_from(file: &str) -> anyhow::Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("TESSERA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: EngineConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.pricing.validate()?;
        self.lending.validate()
    }
}

/// Dynamic pricing parameters
///
/// Rates are basis points. Collateral ratios are percentages of principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Snapshot version, bumped on every update
    pub version: u64,
    /// Rate charged at or below target utilization
    pub base_rate_bps: u32,
    /// Utilization (percent) above which the premium kicks in
    pub target_utilization: u8,
    /// Premium per utilization point above target
    pub utilization_multiplier_bps: u32,
    /// Floor of the final rate
    pub min_rate_bps: u32,
    /// Ceiling of both the raw and final rate
    pub max_rate_bps: u32,
    /// Top of the reputation scale
    pub max_score: u16,
    /// Factor added for a borrower with zero reputation
    pub reputation_sensitivity_bps: u32,
    /// Collateral ratio before the reputation adjustment
    pub base_collateral_ratio_pct: u32,
    /// Lower clamp of the collateral ratio
    pub min_collateral_ratio_pct: u32,
    /// Upper clamp of the collateral ratio
    pub max_collateral_ratio_pct: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            version: 1,
            base_rate_bps: 500,
            target_utilization: 70,
            utilization_multiplier_bps: 20,
            min_rate_bps: 100,
            max_rate_bps: 5_000,
            max_score: DEFAULT_MAX_SCORE,
            reputation_sensitivity_bps: 300,
            base_collateral_ratio_pct: 150,
            min_collateral_ratio_pct: 100,
            max_collateral_ratio_pct: 300,
        }
    }
}

impl PricingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_rate_bps > self.max_rate_bps {
            return Err(LendingError::Config(format!(
                "min_rate_bps {} exceeds max_rate_bps {}",
                self.min_rate_bps, self.max_rate_bps
            )));
        }
        if self.target_utilization > 100 {
            return Err(LendingError::Config(format!(
                "target_utilization {} exceeds 100",
                self.target_utilization
            )));
        }
        if self.max_score == 0 {
            return Err(LendingError::Config("max_score must be positive".into()));
        }
        if self.min_collateral_ratio_pct == 0 {
            return Err(LendingError::Config(
                "min_collateral_ratio_pct must be positive".into(),
            ));
        }
        if self.min_collateral_ratio_pct > self.max_collateral_ratio_pct {
            return Err(LendingError::Config(format!(
                "min_collateral_ratio_pct {} exceeds max_collateral_ratio_pct {}",
                self.min_collateral_ratio_pct, self.max_collateral_ratio_pct
            )));
        }
        Ok(())
    }
}

/// Loan terms and fee routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LendingConfig {
    /// Longest loan a borrower may request
    pub max_duration_secs: i64,
    /// Platform cut of accrued interest
    pub platform_fee_bps: u32,
    /// Account receiving the platform cut
    pub treasury: AccountId,
    /// Custodian of liquidated resources; the depositor when unset
    pub liquidation_recipient: Option<AccountId>,
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 30 * 24 * 60 * 60,
            platform_fee_bps: 1_000,
            treasury: AccountId::from("treasury"),
            liquidation_recipient: None,
        }
    }
}

impl LendingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_duration_secs <= 0 {
            return Err(LendingError::Config(
                "max_duration_secs must be positive".into(),
            ));
        }
        if self.platform_fee_bps > BPS_DENOMINATOR {
            return Err(LendingError::Config(format!(
                "platform_fee_bps {} exceeds {}",
                self.platform_fee_bps, BPS_DENOMINATOR
            )));
        }
        Ok(())
    }
}
