//! ReputationView - read-only access to an external trust score
//!
//! The score source is owned elsewhere and may lag behind reality. Unknown
//! accounts are priced at the midpoint of the scale rather than rejected.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tessera_common::{AccountId, ReputationScore};
use tracing::debug;

/// External trust score source
#[async_trait]
pub trait ReputationView: Send + Sync {
    /// Raw score for an account, `None` when the account is unknown
    async fn get_score(&self, account: &AccountId) -> Option<u16>;
}

/// Adapter normalizing raw scores onto the configured scale
#[derive(Clone)]
pub struct ReputationAdapter {
    source: Arc<dyn ReputationView>,
}

impl ReputationAdapter {
    pub fn new(source: Arc<dyn ReputationView>) -> Self {
        Self { source }
    }

    /// Score clamped to `[0, max_score]`, neutral when unknown
    pub async fn score(&self, account: &AccountId, max_score: u16) -> ReputationScore {
        match self.source.get_score(account).await {
            Some(raw) => ReputationScore::new(raw, max_score),
            None => {
                debug!(account = %account, "Unknown account, using neutral score");
                ReputationScore::neutral(max_score)
            }
        }
    }
}

/// In-memory score table
#[derive(Debug, Default)]
pub struct InMemoryReputation {
    scores: DashMap<AccountId, u16>,
}

impl InMemoryReputation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_score(&self, account: AccountId, score: u16) {
        self.scores.insert(account, score);
    }

    pub fn with_score(self, account: impl Into<String>, score: u16) -> Self {
        self.set_score(AccountId::new(account), score);
        self
    }
}

#[async_trait]
impl ReputationView for InMemoryReputation {
    async fn get_score(&self, account: &AccountId) -> Option<u16> {
        self.scores.get(account).map(|s| *s)
    }
}
