//! LiquidationManager - pull-based settlement of overdue loans
//!
//! There is no scheduler. Anyone may call [`LiquidationManager::liquidate`]
//! once a loan is past its deadline; calling earlier is an error and changes
//! nothing. The lender keeps the full collateral in lieu of interest, and the
//! resource leaves the pool.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tessera_common::{AccountId, LendingError, ResourceId, Result};
use tracing::{info, instrument, warn};

use crate::ledger::{Loan, LoanLedger, LoanStatus};

/// Outcome of a successful liquidation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationReceipt {
    pub loan: Loan,
    /// Account that triggered the liquidation
    pub liquidator: AccountId,
    /// New custodian of the resource
    pub custodian: AccountId,
    /// Collateral paid to the lender
    pub collateral_seized: Decimal,
}

pub struct LiquidationManager {
    ledger: Arc<LoanLedger>,
}

impl LiquidationManager {
    pub fn new(ledger: Arc<LoanLedger>) -> Self {
        Self { ledger }
    }

    #[instrument(skip_all, fields(resource = %resource_id, caller = %caller))]
    pub async fn liquidate(&self, resource_id: &ResourceId, caller: &AccountId) -> Result<LiquidationReceipt> {
        let now = self.ledger.clock().now();
        let (loan, ()) = self
            .ledger
            .close(resource_id, now, LoanStatus::Liquidated, |loan| {
                if now <= loan.deadline() {
                    return Err(LendingError::DeadlineNotReached {
                        deadline: loan.deadline(),
                        now,
                    });
                }
                Ok(())
            })?;

        let custodian = self
            .ledger
            .config()
            .liquidation_recipient
            .clone()
            .unwrap_or_else(|| loan.lender.clone());
        self.ledger.registry().release_to(resource_id, &custodian)?;

        let collateral_seized = match self
            .ledger
            .settlement()
            .release(loan.lock_id, &loan.lender)
            .await
        {
            Ok(amount) => amount,
            Err(err) => {
                warn!(loan = %loan.id, error = %err, "Liquidation settlement failed");
                return Err(err);
            }
        };

        info!(
            loan = %loan.id,
            collateral = %collateral_seized,
            custodian = %custodian,
            "Loan liquidated"
        );
        Ok(LiquidationReceipt {
            loan,
            liquidator: caller.clone(),
            custodian,
            collateral_seized,
        })
    }

    /// Whether a liquidation call would currently pass its checks
    pub fn is_liquidatable(&self, resource_id: &ResourceId) -> bool {
        let now = self.ledger.clock().now();
        self.ledger
            .get_loan(resource_id)
            .map(|loan| loan.is_overdue(now))
            .unwrap_or(false)
    }

    /// Active loans past their deadline, for keepers polling the pool
    pub fn overdue_loans(&self) -> Vec<Loan> {
        let now = self.ledger.clock().now();
        self.ledger
            .active_loans()
            .into_iter()
            .filter(|loan| loan.is_overdue(now))
            .collect()
    }
}
