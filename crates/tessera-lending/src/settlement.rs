//! SettlementLedger - value movement on behalf of the engine
//!
//! The engine only computes amounts. Moving them is delegated to a
//! [`SettlementLedger`], called strictly after the corresponding record
//! transition has been committed.

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tessera_common::{AccountId, EscrowAccount, LendingError, LockId, Result};
use tracing::{debug, instrument};

#[async_trait]
pub trait SettlementLedger: Send + Sync {
    /// Move `amount` from one account's available balance to another's
    async fn transfer(&self, from: &AccountId, to: &AccountId, amount: Decimal) -> Result<()>;

    /// Reserve `amount` of an account's balance, returning a handle to it
    async fn lock(&self, account: &AccountId, amount: Decimal) -> Result<LockId>;

    /// Pay out a whole lock to `to`, returning the released amount
    async fn release(&self, lock_id: LockId, to: &AccountId) -> Result<Decimal>;

    /// Pay fixed amounts out of a lock and hand the rest back to its owner
    ///
    /// Nothing moves when the payouts exceed the locked amount. Returns the
    /// amount handed back.
    async fn settle(&self, lock_id: LockId, payouts: &[(AccountId, Decimal)]) -> Result<Decimal>;
}

#[derive(Debug, Clone)]
struct LockEntry {
    owner: AccountId,
    amount: Decimal,
}

/// Escrow-account backed settlement ledger
///
/// Each account's balance sits in its own map slot. Transfers touch the two
/// slots one after the other so no two slot guards are ever held at once.
#[derive(Debug, Default)]
pub struct InMemorySettlement {
    accounts: DashMap<AccountId, EscrowAccount>,
    locks: DashMap<LockId, LockEntry>,
}

impl InMemorySettlement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account from outside the system
    pub fn fund(&self, account: &AccountId, amount: Decimal) -> Result<()> {
        self.credit(account, amount)
    }

    /// Snapshot of an account
    pub fn account(&self, account: &AccountId) -> Option<EscrowAccount> {
        self.accounts.get(account).map(|a| a.clone())
    }

    pub fn available(&self, account: &AccountId) -> Decimal {
        self.account(account)
            .map(|a| a.available)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn locked(&self, account: &AccountId) -> Decimal {
        self.account(account).map(|a| a.locked).unwrap_or(Decimal::ZERO)
    }

    fn credit(&self, account: &AccountId, amount: Decimal) -> Result<()> {
        self.accounts
            .entry(account.clone())
            .or_insert_with(|| EscrowAccount::new(account.clone()))
            .credit(amount)?;
        Ok(())
    }

    fn unknown(account: &AccountId) -> LendingError {
        LendingError::Settlement(format!("unknown account {}", account))
    }
}

#[async_trait]
impl SettlementLedger for InMemorySettlement {
    #[instrument(skip(self))]
    async fn transfer(&self, from: &AccountId, to: &AccountId, amount: Decimal) -> Result<()> {
        if amount.is_zero() || from == to {
            return Ok(());
        }

        self.accounts
            .get_mut(from)
            .ok_or_else(|| Self::unknown(from))?
            .debit(amount)?;
        self.credit(to, amount)?;

        debug!("Transfer settled");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn lock(&self, account: &AccountId, amount: Decimal) -> Result<LockId> {
        self.accounts
            .get_mut(account)
            .ok_or_else(|| Self::unknown(account))?
            .lock(amount)?;

        let lock_id = LockId::generate();
        self.locks.insert(
            lock_id,
            LockEntry {
                owner: account.clone(),
                amount,
            },
        );
        debug!(%lock_id, "Collateral locked");
        Ok(lock_id)
    }

    #[instrument(skip(self))]
    async fn release(&self, lock_id: LockId, to: &AccountId) -> Result<Decimal> {
        let (_, entry) = self
            .locks
            .remove(&lock_id)
            .ok_or_else(|| LendingError::Settlement(format!("unknown lock {}", lock_id)))?;

        if entry.owner == *to {
            self.accounts
                .get_mut(&entry.owner)
                .ok_or_else(|| Self::unknown(&entry.owner))?
                .unlock(entry.amount)?;
        } else {
            let seized = self
                .accounts
                .get_mut(&entry.owner)
                .ok_or_else(|| Self::unknown(&entry.owner))?
                .forfeit_locked(entry.amount)?;
            self.credit(to, seized)?;
        }

        debug!(amount = %entry.amount, "Lock released");
        Ok(entry.amount)
    }

    #[instrument(skip(self, payouts))]
    async fn settle(&self, lock_id: LockId, payouts: &[(AccountId, Decimal)]) -> Result<Decimal> {
        let (_, entry) = self
            .locks
            .remove(&lock_id)
            .ok_or_else(|| LendingError::Settlement(format!("unknown lock {}", lock_id)))?;

        let paid: Decimal = payouts.iter().map(|(_, amount)| *amount).sum();
        if paid > entry.amount || payouts.iter().any(|(_, amount)| amount.is_sign_negative()) {
            let err = LendingError::Settlement(format!(
                "payouts {} do not fit lock of {}",
                paid, entry.amount
            ));
            self.locks.insert(lock_id, entry);
            return Err(err);
        }

        let remainder = entry.amount - paid;
        {
            let mut owner = self
                .accounts
                .get_mut(&entry.owner)
                .ok_or_else(|| Self::unknown(&entry.owner))?;
            if !paid.is_zero() {
                owner.forfeit_locked(paid)?;
            }
            if !remainder.is_zero() {
                owner.unlock(remainder)?;
            }
        }
        for (to, amount) in payouts.iter().filter(|(_, amount)| !amount.is_zero()) {
            self.credit(to, *amount)?;
        }

        debug!(%paid, %remainder, "Lock settled");
        Ok(remainder)
    }
}
