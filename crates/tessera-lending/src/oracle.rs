//! ValueOracle - assessed principal value of a resource

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tessera_common::{LendingError, ResourceId, Result};

#[async_trait]
pub trait ValueOracle: Send + Sync {
    /// Current principal value of a resource; must be positive
    async fn get_value(&self, resource_id: &ResourceId) -> Result<Decimal>;
}

/// Fixed price table
#[derive(Debug, Default)]
pub struct StaticValueOracle {
    values: DashMap<ResourceId, Decimal>,
}

impl StaticValueOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(&self, resource_id: ResourceId, value: Decimal) {
        self.values.insert(resource_id, value);
    }
}

#[async_trait]
impl ValueOracle for StaticValueOracle {
    async fn get_value(&self, resource_id: &ResourceId) -> Result<Decimal> {
        self.values
            .get(resource_id)
            .map(|v| *v)
            .ok_or_else(|| LendingError::Oracle(format!("no value for {}", resource_id)))
    }
}
