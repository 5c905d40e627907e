//! LendingEngine - public API over the lending components
//!
//! Wires the registry, pricing, ledger and liquidation components to their
//! collaborators and exposes the operations a hosting application calls.
//! Principal values come from the [`ValueOracle`] at call time; the engine
//! never assumes a fixed value for a resource.

use std::sync::Arc;

use rust_decimal::Decimal;
use tessera_common::{AccountId, LendingError, ResourceId, Result};
use tracing::instrument;

use crate::clock::{Clock, SystemClock};
use crate::config::{EngineConfig, PricingConfig};
use crate::ledger::{BorrowRequest, Loan, LoanLedger, ReturnReceipt};
use crate::liquidation::{LiquidationManager, LiquidationReceipt};
use crate::oracle::ValueOracle;
use crate::pricing::{PricingEngine, Quote, RiskPolicy};
use crate::registry::{AssetRegistry, PoolStats, ResourceRecord};
use crate::reputation::ReputationView;
use crate::settlement::SettlementLedger;

pub struct LendingEngine {
    registry: Arc<AssetRegistry>,
    pricing: Arc<PricingEngine>,
    ledger: Arc<LoanLedger>,
    liquidation: LiquidationManager,
    oracle: Arc<dyn ValueOracle>,
}

impl LendingEngine {
    pub fn builder(config: EngineConfig) -> LendingEngineBuilder {
        LendingEngineBuilder::new(config)
    }

    pub fn deposit(&self, depositor: &AccountId, resource_id: &ResourceId) -> Result<ResourceRecord> {
        self.registry.deposit(depositor, resource_id)
    }

    pub fn withdraw(&self, caller: &AccountId, resource_id: &ResourceId) -> Result<ResourceRecord> {
        self.registry.withdraw(caller, resource_id)
    }

    /// Borrow a resource at its current oracle value
    #[instrument(skip_all, fields(resource = %resource_id, borrower = %borrower))]
    pub async fn borrow(
        &self,
        resource_id: &ResourceId,
        borrower: &AccountId,
        duration_secs: i64,
        provided_collateral: Decimal,
    ) -> Result<Loan> {
        let principal_value = self.principal_value(resource_id).await?;
        self.ledger
            .borrow(BorrowRequest {
                resource_id: resource_id.clone(),
                borrower: borrower.clone(),
                duration_secs,
                principal_value,
                provided_collateral,
            })
            .await
    }

    pub async fn return_loan(&self, resource_id: &ResourceId, caller: &AccountId) -> Result<ReturnReceipt> {
        self.ledger.return_loan(resource_id, caller).await
    }

    pub async fn liquidate(&self, resource_id: &ResourceId, caller: &AccountId) -> Result<LiquidationReceipt> {
        self.liquidation.liquidate(resource_id, caller).await
    }

    /// Terms a borrower would get for a resource right now
    pub async fn quote(&self, borrower: &AccountId, resource_id: &ResourceId) -> Result<Quote> {
        let principal_value = self.principal_value(resource_id).await?;
        self.pricing.quote(borrower, principal_value).await
    }

    pub fn utilization(&self) -> u8 {
        self.pricing.utilization()
    }

    pub fn get_loan(&self, resource_id: &ResourceId) -> Option<Loan> {
        self.ledger.get_loan(resource_id)
    }

    pub fn loan_history(&self, resource_id: &ResourceId) -> Vec<Loan> {
        self.ledger.loan_history(resource_id)
    }

    pub fn interest_owed(&self, resource_id: &ResourceId) -> Result<Decimal> {
        self.ledger.interest_owed(resource_id)
    }

    pub fn overdue_loans(&self) -> Vec<Loan> {
        self.liquidation.overdue_loans()
    }

    pub fn resource(&self, resource_id: &ResourceId) -> Option<ResourceRecord> {
        self.registry.get(resource_id)
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.registry.stats()
    }

    pub fn pricing_config(&self) -> Arc<PricingConfig> {
        self.pricing.config()
    }

    pub fn update_pricing_config(&self, config: PricingConfig) -> Result<Arc<PricingConfig>> {
        self.pricing.update_config(config)
    }

    async fn principal_value(&self, resource_id: &ResourceId) -> Result<Decimal> {
        let value = self.oracle.get_value(resource_id).await?;
        if value <= Decimal::ZERO {
            return Err(LendingError::Oracle(format!(
                "non-positive value {} for {}",
                value, resource_id
            )));
        }
        Ok(value)
    }
}

/// Builder wiring collaborators into a [`LendingEngine`]
pub struct LendingEngineBuilder {
    config: EngineConfig,
    oracle: Option<Arc<dyn ValueOracle>>,
    reputation: Option<Arc<dyn ReputationView>>,
    settlement: Option<Arc<dyn SettlementLedger>>,
    clock: Arc<dyn Clock>,
    policy: Option<Arc<dyn RiskPolicy>>,
}

impl LendingEngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            oracle: None,
            reputation: None,
            settlement: None,
            clock: Arc::new(SystemClock),
            policy: None,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn ValueOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_reputation(mut self, reputation: Arc<dyn ReputationView>) -> Self {
        self.reputation = Some(reputation);
        self
    }

    pub fn with_settlement(mut self, settlement: Arc<dyn SettlementLedger>) -> Self {
        self.settlement = Some(settlement);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn RiskPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn build(self) -> Result<LendingEngine> {
        let missing = |what: &str| LendingError::Config(format!("{} not configured", what));
        let oracle = self.oracle.ok_or_else(|| missing("value oracle"))?;
        let reputation = self.reputation.ok_or_else(|| missing("reputation view"))?;
        let settlement = self.settlement.ok_or_else(|| missing("settlement ledger"))?;

        self.config.validate()?;

        let registry = Arc::new(AssetRegistry::new(self.clock.clone()));
        let mut pricing = PricingEngine::new(self.config.pricing, registry.clone(), reputation)?;
        if let Some(policy) = self.policy {
            pricing = pricing.with_policy(policy);
        }
        let pricing = Arc::new(pricing);

        let ledger = Arc::new(LoanLedger::new(
            self.config.lending,
            registry.clone(),
            pricing.clone(),
            settlement,
            self.clock,
        )?);

        Ok(LendingEngine {
            registry,
            pricing,
            liquidation: LiquidationManager::new(ledger.clone()),
            ledger,
            oracle,
        })
    }
}
