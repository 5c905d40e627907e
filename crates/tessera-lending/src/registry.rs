//! AssetRegistry - custody of deposited resources
//!
//! Each resource record lives in its own `DashMap` slot, so operations on
//! different resources never contend. Custody transitions are compare-and-set
//! under the slot guard, and the pool counters are updated inside that same
//! critical section. Utilization is read from the counters, never by scanning
//! records.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tessera_common::{AccountId, LendingError, ResourceId, Result, MAX_UTILIZATION};
use tracing::{debug, info, instrument};

use crate::clock::Clock;

/// Custody state of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustodyState {
    /// Outside the pool, held by `holder` (after liquidation)
    AtRest,
    /// In the pool and available to borrow
    Deposited,
    /// In the pool with exactly one active loan
    OnLoan,
}

impl std::fmt::Display for CustodyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CustodyState::AtRest => write!(f, "at_rest"),
            CustodyState::Deposited => write!(f, "deposited"),
            CustodyState::OnLoan => write!(f, "on_loan"),
        }
    }
}

/// Custody record of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    /// Account that deposited it and may withdraw it
    pub depositor: AccountId,
    /// Account currently entitled to the resource
    pub holder: AccountId,
    pub state: CustodyState,
    /// Unix seconds of the last deposit
    pub deposited_at: i64,
}

/// Incrementally maintained pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Resources in the pool, on loan or not
    pub deposited_count: u64,
    /// Resources currently on loan
    pub borrowed_count: u64,
}

impl PoolStats {
    /// Borrowed share of the pool as a percentage in `[0, 100]`
    pub fn utilization(&self) -> u8 {
        if self.deposited_count == 0 {
            return 0;
        }
        let pct = self.borrowed_count.saturating_mul(100) / self.deposited_count;
        pct.min(MAX_UTILIZATION as u64) as u8
    }

    /// Resources available to borrow
    pub fn available_count(&self) -> u64 {
        self.deposited_count.saturating_sub(self.borrowed_count)
    }
}

pub struct AssetRegistry {
    records: DashMap<ResourceId, ResourceRecord>,
    stats: Mutex<PoolStats>,
    clock: Arc<dyn Clock>,
}

impl AssetRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            stats: Mutex::new(PoolStats::default()),
            clock,
        }
    }

    /// Register a resource in the pool
    ///
    /// A resource sitting `AtRest` after liquidation may be re-deposited by
    /// its current holder, who becomes the new depositor.
    #[instrument(skip_all, fields(resource = %resource_id, depositor = %depositor))]
    pub fn deposit(&self, depositor: &AccountId, resource_id: &ResourceId) -> Result<ResourceRecord> {
        let now = self.clock.now();
        let record = match self.records.entry(resource_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.state != CustodyState::AtRest || record.holder != *depositor {
                    return Err(LendingError::AlreadyRegistered(resource_id.to_string()));
                }
                record.depositor = depositor.clone();
                record.state = CustodyState::Deposited;
                record.deposited_at = now;
                self.stats.lock().deposited_count += 1;
                record.clone()
            }
            Entry::Vacant(vacant) => {
                let record = ResourceRecord {
                    id: resource_id.clone(),
                    depositor: depositor.clone(),
                    holder: depositor.clone(),
                    state: CustodyState::Deposited,
                    deposited_at: now,
                };
                vacant.insert(record.clone());
                self.stats.lock().deposited_count += 1;
                record
            }
        };

        info!("Resource deposited");
        Ok(record)
    }

    /// Remove a resource that is not on loan and hand it back to its depositor
    #[instrument(skip_all, fields(resource = %resource_id, caller = %caller))]
    pub fn withdraw(&self, caller: &AccountId, resource_id: &ResourceId) -> Result<ResourceRecord> {
        let Entry::Occupied(occupied) = self.records.entry(resource_id.clone()) else {
            return Err(LendingError::NotFound(resource_id.to_string()));
        };

        let record = occupied.get();
        if record.depositor != *caller {
            return Err(LendingError::NotOwner {
                caller: caller.to_string(),
                resource: resource_id.to_string(),
            });
        }
        if record.state != CustodyState::Deposited {
            return Err(LendingError::StillOnLoan(resource_id.to_string()));
        }

        let (_, record) = occupied.remove_entry();
        let mut stats = self.stats.lock();
        stats.deposited_count = stats.deposited_count.saturating_sub(1);
        drop(stats);

        info!("Resource withdrawn");
        Ok(record)
    }

    /// `Deposited → OnLoan`; at most one concurrent caller succeeds
    pub(crate) fn mark_on_loan(&self, resource_id: &ResourceId) -> Result<ResourceRecord> {
        self.transition(resource_id, CustodyState::Deposited, |record, stats| {
            record.state = CustodyState::OnLoan;
            stats.borrowed_count += 1;
        })
    }

    /// `OnLoan → Deposited`
    pub(crate) fn mark_deposited(&self, resource_id: &ResourceId) -> Result<ResourceRecord> {
        self.transition(resource_id, CustodyState::OnLoan, |record, stats| {
            record.state = CustodyState::Deposited;
            stats.borrowed_count = stats.borrowed_count.saturating_sub(1);
        })
    }

    /// `OnLoan → AtRest`, moving custody out of the pool to `recipient`
    pub(crate) fn release_to(
        &self,
        resource_id: &ResourceId,
        recipient: &AccountId,
    ) -> Result<ResourceRecord> {
        self.transition(resource_id, CustodyState::OnLoan, |record, stats| {
            record.state = CustodyState::AtRest;
            record.holder = recipient.clone();
            stats.borrowed_count = stats.borrowed_count.saturating_sub(1);
            stats.deposited_count = stats.deposited_count.saturating_sub(1);
        })
    }

    fn transition(
        &self,
        resource_id: &ResourceId,
        expected: CustodyState,
        apply: impl FnOnce(&mut ResourceRecord, &mut PoolStats),
    ) -> Result<ResourceRecord> {
        let mut record = self
            .records
            .get_mut(resource_id)
            .ok_or_else(|| LendingError::NotFound(resource_id.to_string()))?;

        if record.state != expected {
            return Err(LendingError::invalid_state(expected, record.state));
        }

        let from = record.state;
        let mut stats = self.stats.lock();
        apply(&mut *record, &mut *stats);
        debug!(resource = %resource_id, %from, to = %record.state, "Custody transition");
        Ok(record.clone())
    }

    pub fn get(&self, resource_id: &ResourceId) -> Option<ResourceRecord> {
        self.records.get(resource_id).map(|r| r.clone())
    }

    pub fn stats(&self) -> PoolStats {
        *self.stats.lock()
    }

    pub fn utilization(&self) -> u8 {
        self.stats().utilization()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn registry() -> AssetRegistry {
        AssetRegistry::new(Arc::new(ManualClock::new(1_000)))
    }

    fn alice() -> AccountId {
        AccountId::from("alice")
    }

    #[test]
    fn test_deposit_withdraw_round_trip() {
        let reg = registry();
        let id = ResourceId::from("nft-1");
        let before = reg.stats();

        let record = reg.deposit(&alice(), &id).unwrap();
        assert_eq!(record.state, CustodyState::Deposited);
        assert_eq!(record.deposited_at, 1_000);
        assert_eq!(reg.stats().deposited_count, 1);

        reg.withdraw(&alice(), &id).unwrap();
        assert!(reg.get(&id).is_none());
        assert_eq!(reg.stats(), before);
    }

    #[test]
    fn test_duplicate_deposit_rejected() {
        let reg = registry();
        let id = ResourceId::from("nft-1");
        reg.deposit(&alice(), &id).unwrap();

        let err = reg.deposit(&AccountId::from("bob"), &id).unwrap_err();
        assert!(matches!(err, LendingError::AlreadyRegistered(_)));
        assert_eq!(reg.stats().deposited_count, 1);
    }

    #[test]
    fn test_withdraw_requires_depositor() {
        let reg = registry();
        let id = ResourceId::from("nft-1");
        reg.deposit(&alice(), &id).unwrap();

        let err = reg.withdraw(&AccountId::from("mallory"), &id).unwrap_err();
        assert!(matches!(err, LendingError::NotOwner { .. }));
        assert!(reg.get(&id).is_some());
    }

    #[test]
    fn test_withdraw_on_loan_rejected() {
        let reg = registry();
        let id = ResourceId::from("nft-1");
        reg.deposit(&alice(), &id).unwrap();
        reg.mark_on_loan(&id).unwrap();

        let err = reg.withdraw(&alice(), &id).unwrap_err();
        assert!(matches!(err, LendingError::StillOnLoan(_)));
    }

    #[test]
    fn test_withdraw_at_rest_rejected() {
        let reg = registry();
        let id = ResourceId::from("nft-1");
        reg.deposit(&alice(), &id).unwrap();
        reg.mark_on_loan(&id).unwrap();
        reg.release_to(&id, &alice()).unwrap();

        let err = reg.withdraw(&alice(), &id).unwrap_err();
        assert!(matches!(err, LendingError::StillOnLoan(_)));
        assert_eq!(reg.get(&id).unwrap().state, CustodyState::AtRest);
        assert_eq!(reg.stats(), PoolStats::default());
    }

    #[test]
    fn test_mark_on_loan_is_exclusive() {
        let reg = registry();
        let id = ResourceId::from("nft-1");
        reg.deposit(&alice(), &id).unwrap();

        reg.mark_on_loan(&id).unwrap();
        let err = reg.mark_on_loan(&id).unwrap_err();
        assert!(matches!(err, LendingError::InvalidState { .. }));
        assert_eq!(reg.stats().borrowed_count, 1);

        reg.mark_deposited(&id).unwrap();
        assert_eq!(reg.stats().borrowed_count, 0);
        assert!(reg.mark_deposited(&id).is_err());
    }

    #[test]
    fn test_utilization_counts() {
        let reg = registry();
        assert_eq!(reg.utilization(), 0);

        for i in 0..10 {
            reg.deposit(&alice(), &ResourceId::new(format!("nft-{i}"))).unwrap();
        }
        for i in 0..8 {
            reg.mark_on_loan(&ResourceId::new(format!("nft-{i}"))).unwrap();
        }
        assert_eq!(reg.utilization(), 80);
        assert_eq!(reg.stats().available_count(), 2);
    }

    #[test]
    fn test_release_and_redeposit() {
        let reg = registry();
        let id = ResourceId::from("nft-1");
        let keeper = AccountId::from("keeper");
        reg.deposit(&alice(), &id).unwrap();
        reg.mark_on_loan(&id).unwrap();

        let record = reg.release_to(&id, &keeper).unwrap();
        assert_eq!(record.state, CustodyState::AtRest);
        assert_eq!(reg.stats(), PoolStats::default());

        // Only the holder may bring it back
        assert!(reg.deposit(&alice(), &id).is_err());
        let record = reg.deposit(&keeper, &id).unwrap();
        assert_eq!(record.depositor, keeper);
        assert_eq!(reg.stats().deposited_count, 1);
    }

    #[test]
    fn test_unknown_resource() {
        let reg = registry();
        let id = ResourceId::from("ghost");
        assert!(matches!(reg.withdraw(&alice(), &id), Err(LendingError::NotFound(_))));
        assert!(matches!(reg.mark_on_loan(&id), Err(LendingError::NotFound(_))));
    }
}
