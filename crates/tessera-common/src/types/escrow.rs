//! Escrow accounts - available vs locked balances
//!
//! The in-memory settlement ledger keeps one [`EscrowAccount`] per holder.
//! Collateral moves from `available` to `locked` when a loan opens and leaves
//! `locked` either back to the holder or out to a third party when it closes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ids::AccountId;

/// Escrow operation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EscrowError {
    #[error("Insufficient available balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("Insufficient locked balance: required {required}, locked {locked}")]
    InsufficientLocked { required: Decimal, locked: Decimal },

    #[error("Amount must be positive")]
    InvalidAmount,

}

/// Balance bookkeeping for one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowAccount {
    /// Account holder
    pub holder: AccountId,

    /// Spendable balance
    pub available: Decimal,

    /// Balance reserved as collateral
    pub locked: Decimal,

    /// Bumped on every balance change
    pub version: u64,

    /// Timestamp of last modification (Unix milliseconds)
    pub updated_at: i64,
}

impl EscrowAccount {
    /// Create a new empty account
    pub fn new(holder: AccountId) -> Self {
        Self {
            holder,
            available: Decimal::ZERO,
            locked: Decimal::ZERO,
            version: 0,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create an account with initial balance
    pub fn with_balance(holder: AccountId, initial_balance: Decimal) -> Self {
        let mut account = Self::new(holder);
        account.available = initial_balance;
        account
    }

    /// Total balance (available + locked)
    #[inline]
    pub fn total(&self) -> Decimal {
        self.available + self.locked
    }

    pub fn credit(&mut self, amount: Decimal) -> Result<(), EscrowError> {
        Self::ensure_positive(amount)?;
        self.available += amount;
        self.touch();
        Ok(())
    }

    pub fn debit(&mut self, amount: Decimal) -> Result<(), EscrowError> {
        Self::ensure_positive(amount)?;
        self.ensure_available(amount)?;
        self.available -= amount;
        self.touch();
        Ok(())
    }

    /// Move funds from available to locked
    pub fn lock(&mut self, amount: Decimal) -> Result<(), EscrowError> {
        Self::ensure_positive(amount)?;
        self.ensure_available(amount)?;
        self.available -= amount;
        self.locked += amount;
        self.touch();
        Ok(())
    }

    /// Move funds from locked back to available
    pub fn unlock(&mut self, amount: Decimal) -> Result<(), EscrowError> {
        Self::ensure_positive(amount)?;
        self.ensure_locked(amount)?;
        self.locked -= amount;
        self.available += amount;
        self.touch();
        Ok(())
    }

    /// Take locked funds out of this account, returning the amount for payout
    pub fn forfeit_locked(&mut self, amount: Decimal) -> Result<Decimal, EscrowError> {
        Self::ensure_positive(amount)?;
        self.ensure_locked(amount)?;
        self.locked -= amount;
        self.touch();
        Ok(amount)
    }

    fn ensure_positive(amount: Decimal) -> Result<(), EscrowError> {
        if amount <= Decimal::ZERO {
            return Err(EscrowError::InvalidAmount);
        }
        Ok(())
    }

    fn ensure_available(&self, amount: Decimal) -> Result<(), EscrowError> {
        if self.available < amount {
            return Err(EscrowError::InsufficientBalance {
                required: amount,
                available: self.available,
            });
        }
        Ok(())
    }

    fn ensure_locked(&self, amount: Decimal) -> Result<(), EscrowError> {
        if self.locked < amount {
            return Err(EscrowError::InsufficientLocked {
                required: amount,
                locked: self.locked,
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

impl std::fmt::Display for EscrowAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EscrowAccount({}: available={}, locked={})",
            self.holder, self.available, self.locked
        )
    }
}
