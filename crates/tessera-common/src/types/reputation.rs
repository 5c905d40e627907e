//! ReputationScore - bounded trust metric read from an external source
//!
//! Scores live on `[0, max]`. The engine never mutates them; it only asks how
//! far a borrower sits below the top of the scale, which drives the risk
//! premium on both rate and collateral.

use serde::{Deserialize, Serialize};

/// A score already clamped to its scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationScore {
    /// Score value in `[0, max]`
    pub score: u16,

    /// Top of the scale
    pub max: u16,
}

impl ReputationScore {
    /// Create a score, clamping values above the scale
    pub fn new(score: u16, max: u16) -> Self {
        Self {
            score: score.min(max),
            max,
        }
    }

    /// Neutral score used for unknown accounts: the midpoint of the scale
    pub fn neutral(max: u16) -> Self {
        Self::new(max / 2, max)
    }

    /// Distance below the top of the scale
    #[inline]
    pub fn deficit(&self) -> u16 {
        self.max - self.score
    }
}

impl std::fmt::Display for ReputationScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.score, self.max)
    }
}
