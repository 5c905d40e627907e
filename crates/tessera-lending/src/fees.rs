//! FeeSplitter - lender/platform division of accrued interest

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tessera_common::{LendingError, Result, BPS_DENOMINATOR};

/// Interest allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub lender_share: Decimal,
    pub platform_share: Decimal,
}

impl FeeSplit {
    pub fn total(&self) -> Decimal {
        self.lender_share + self.platform_share
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplitter {
    platform_fee_bps: u32,
}

impl FeeSplitter {
    pub fn new(platform_fee_bps: u32) -> Result<Self> {
        if platform_fee_bps > BPS_DENOMINATOR {
            return Err(LendingError::bounds(format!(
                "platform fee {} bps exceeds {}",
                platform_fee_bps, BPS_DENOMINATOR
            )));
        }
        Ok(Self { platform_fee_bps })
    }

    pub fn platform_fee_bps(&self) -> u32 {
        self.platform_fee_bps
    }

    /// Split interest; the lender gets whatever the platform cut leaves,
    /// so the two shares always sum to the input exactly.
    pub fn split(&self, total_interest: Decimal) -> FeeSplit {
        if total_interest <= Decimal::ZERO {
            return FeeSplit {
                lender_share: Decimal::ZERO,
                platform_share: Decimal::ZERO,
            };
        }

        let platform_share = total_interest * Decimal::from(self.platform_fee_bps)
            / Decimal::from(BPS_DENOMINATOR);
        FeeSplit {
            lender_share: total_interest - platform_share,
            platform_share,
        }
    }
}
