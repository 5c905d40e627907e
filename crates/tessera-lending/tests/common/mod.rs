//! Shared harness for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tessera_lending::{
    AccountId, EngineConfig, InMemoryReputation, InMemorySettlement, LendingEngine, ManualClock,
    ResourceId, StaticValueOracle,
};

pub const START: i64 = 1_700_000_000;
pub const DAY: i64 = 86_400;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct TestHarness {
    pub engine: LendingEngine,
    pub oracle: Arc<StaticValueOracle>,
    pub reputation: Arc<InMemoryReputation>,
    pub settlement: Arc<InMemorySettlement>,
    pub clock: Arc<ManualClock>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();

        let oracle = Arc::new(StaticValueOracle::new());
        let reputation = Arc::new(InMemoryReputation::new());
        let settlement = Arc::new(InMemorySettlement::new());
        let clock = Arc::new(ManualClock::new(START));

        let engine = LendingEngine::builder(config)
            .with_oracle(oracle.clone())
            .with_reputation(reputation.clone())
            .with_settlement(settlement.clone())
            .with_clock(clock.clone())
            .build()
            .expect("engine should build");

        Self {
            engine,
            oracle,
            reputation,
            settlement,
            clock,
        }
    }

    /// Deposit `count` resources named `nft-0..` worth 1000 each
    pub fn seed_pool(&self, depositor: &AccountId, count: usize) -> Vec<ResourceId> {
        (0..count)
            .map(|i| {
                let id = ResourceId::new(format!("nft-{i}"));
                self.oracle.set_value(id.clone(), dec!(1000));
                self.engine.deposit(depositor, &id).expect("deposit");
                id
            })
            .collect()
    }

    pub fn fund(&self, account: &AccountId, amount: Decimal) {
        self.settlement.fund(account, amount).expect("fund");
    }
}

pub fn account(name: &str) -> AccountId {
    AccountId::from(name)
}
