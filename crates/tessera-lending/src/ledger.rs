//! LoanLedger - borrow/return state machine
//!
//! ```text
//! Available ──borrow──▶ Active ──return_loan──▶ Returned
//!                          └────liquidate─────▶ Liquidated
//! ```
//!
//! Loans are kept per resource, newest last. Terminal loans are never
//! touched again and stay as history. Every transition validates first,
//! commits the record, and only then calls the settlement ledger.

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tessera_common::{
    AccountId, LendingError, LoanId, LockId, ResourceId, Result, BPS_DENOMINATOR, SECONDS_PER_YEAR,
};
use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::config::LendingConfig;
use crate::fees::{FeeSplit, FeeSplitter};
use crate::pricing::PricingEngine;
use crate::registry::{AssetRegistry, CustodyState};
use crate::settlement::SettlementLedger;

/// Loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Returned,
    Liquidated,
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoanStatus::Active => write!(f, "active"),
            LoanStatus::Returned => write!(f, "returned"),
            LoanStatus::Liquidated => write!(f, "liquidated"),
        }
    }
}

/// A time-bounded loan of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub resource_id: ResourceId,
    pub borrower: AccountId,
    /// Depositor of the resource when the loan opened
    pub lender: AccountId,
    /// Assessed value the loan was priced on
    pub principal_value: Decimal,
    /// Unix seconds
    pub start_time: i64,
    pub max_duration_secs: i64,
    /// Collateral locked for the loan's lifetime
    pub collateral_amount: Decimal,
    /// Annual rate locked at origination
    pub origination_rate_bps: u32,
    /// Pricing snapshot the rate came from
    pub config_version: u64,
    pub lock_id: LockId,
    pub status: LoanStatus,
    /// Unix seconds of the terminal transition
    pub closed_at: Option<i64>,
}

impl Loan {
    /// Last second at which the loan may still be returned
    pub fn deadline(&self) -> i64 {
        self.start_time.saturating_add(self.max_duration_secs)
    }

    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    pub fn is_overdue(&self, now: i64) -> bool {
        self.is_active() && now > self.deadline()
    }
}

/// Parameters of a borrow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowRequest {
    pub resource_id: ResourceId,
    pub borrower: AccountId,
    pub duration_secs: i64,
    pub principal_value: Decimal,
    pub provided_collateral: Decimal,
}

/// Outcome of a successful return
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnReceipt {
    pub loan: Loan,
    /// Interest accrued over the loan
    pub interest_owed: Decimal,
    /// Split of the interest actually paid, at most the collateral
    pub fees: FeeSplit,
    /// Collateral handed back to the borrower
    pub collateral_returned: Decimal,
}

pub struct LoanLedger {
    loans: DashMap<ResourceId, Vec<Loan>>,
    registry: Arc<AssetRegistry>,
    pricing: Arc<PricingEngine>,
    settlement: Arc<dyn SettlementLedger>,
    clock: Arc<dyn Clock>,
    fees: FeeSplitter,
    config: LendingConfig,
}

impl LoanLedger {
    pub fn new(
        config: LendingConfig,
        registry: Arc<AssetRegistry>,
        pricing: Arc<PricingEngine>,
        settlement: Arc<dyn SettlementLedger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            loans: DashMap::new(),
            registry,
            pricing,
            settlement,
            clock,
            fees: FeeSplitter::new(config.platform_fee_bps)?,
            config,
        })
    }

    /// Open a loan on a deposited resource
    ///
    /// Terms come from a fresh quote; the rate is locked into the loan. If
    /// locking the collateral fails the custody transition is undone and the
    /// settlement error is returned.
    #[instrument(skip_all, fields(resource = %request.resource_id, borrower = %request.borrower))]
    pub async fn borrow(&self, request: BorrowRequest) -> Result<Loan> {
        let BorrowRequest {
            resource_id,
            borrower,
            duration_secs,
            principal_value,
            provided_collateral,
        } = request;

        if duration_secs <= 0 || duration_secs > self.config.max_duration_secs {
            return Err(LendingError::bounds(format!(
                "duration {}s outside (0, {}]",
                duration_secs, self.config.max_duration_secs
            )));
        }

        let record = self
            .registry
            .get(&resource_id)
            .ok_or_else(|| LendingError::NotFound(resource_id.to_string()))?;
        if record.state != CustodyState::Deposited {
            return Err(LendingError::invalid_state(CustodyState::Deposited, record.state));
        }

        let quote = self.pricing.quote(&borrower, principal_value).await?;
        if provided_collateral < quote.collateral {
            return Err(LendingError::InsufficientCollateral {
                required: quote.collateral,
                provided: provided_collateral,
            });
        }

        // Loser of a concurrent borrow stops here with InvalidState
        let record = self.registry.mark_on_loan(&resource_id)?;

        let lock_id = match self.settlement.lock(&borrower, provided_collateral).await {
            Ok(lock_id) => lock_id,
            Err(err) => {
                warn!(error = %err, "Collateral lock failed, reverting custody");
                self.registry.mark_deposited(&resource_id)?;
                return Err(err);
            }
        };

        let loan = Loan {
            id: LoanId::generate(),
            resource_id: resource_id.clone(),
            borrower,
            lender: record.depositor,
            principal_value,
            start_time: self.clock.now(),
            max_duration_secs: duration_secs,
            collateral_amount: provided_collateral,
            origination_rate_bps: quote.rate_bps,
            config_version: quote.config_version,
            lock_id,
            status: LoanStatus::Active,
            closed_at: None,
        };
        self.loans.entry(resource_id).or_default().push(loan.clone());

        info!(
            loan = %loan.id,
            rate_bps = loan.origination_rate_bps,
            collateral = %loan.collateral_amount,
            deadline = loan.deadline(),
            "Loan opened"
        );
        Ok(loan)
    }

    /// Linear accrual at the origination rate
    ///
    /// ```text
    /// interest = principal × rate_bps × elapsed / SECONDS_PER_YEAR / 10_000
    /// ```
    pub fn calculate_interest_owed(loan: &Loan, as_of: i64) -> Result<Decimal> {
        let elapsed = as_of.saturating_sub(loan.start_time).max(0);
        let scaled = loan
            .principal_value
            .checked_mul(Decimal::from(loan.origination_rate_bps))
            .and_then(|v| v.checked_mul(Decimal::from(elapsed)))
            .ok_or_else(|| LendingError::bounds("interest overflow"))?;
        Ok(scaled / Decimal::from(SECONDS_PER_YEAR) / Decimal::from(BPS_DENOMINATOR))
    }

    /// Close an active loan before its deadline
    ///
    /// Interest is paid out of the locked collateral, split between the
    /// lender and the treasury, and the rest of the lock goes back to the
    /// borrower. Interest beyond the collateral is not recoverable.
    #[instrument(skip_all, fields(resource = %resource_id, caller = %caller))]
    pub async fn return_loan(&self, resource_id: &ResourceId, caller: &AccountId) -> Result<ReturnReceipt> {
        let now = self.clock.now();
        let (loan, interest_owed) = self.close(resource_id, now, LoanStatus::Returned, |loan| {
            if loan.borrower != *caller {
                return Err(LendingError::NotBorrower {
                    caller: caller.to_string(),
                    resource: resource_id.to_string(),
                });
            }
            if now > loan.deadline() {
                return Err(LendingError::DeadlinePassed {
                    deadline: loan.deadline(),
                    now,
                });
            }
            Self::calculate_interest_owed(loan, now)
        })?;

        self.registry.mark_deposited(resource_id)?;

        let fees = self.fees.split(interest_owed.min(loan.collateral_amount));
        let payouts = [
            (loan.lender.clone(), fees.lender_share),
            (self.config.treasury.clone(), fees.platform_share),
        ];
        let collateral_returned = match self.settlement.settle(loan.lock_id, &payouts).await {
            Ok(remainder) => remainder,
            Err(err) => {
                warn!(loan = %loan.id, error = %err, "Return settlement failed");
                return Err(err);
            }
        };
        if fees.total() < interest_owed {
            warn!(
                loan = %loan.id,
                shortfall = %(interest_owed - fees.total()),
                "Interest exceeds collateral"
            );
        }

        info!(
            loan = %loan.id,
            interest = %interest_owed,
            lender_share = %fees.lender_share,
            platform_share = %fees.platform_share,
            returned = %collateral_returned,
            "Loan returned"
        );
        Ok(ReturnReceipt {
            loan,
            interest_owed,
            fees,
            collateral_returned,
        })
    }

    /// Move the newest loan of a resource from `Active` to `status`
    ///
    /// `check` runs under the record guard after the status check, and its
    /// output is returned alongside the closed loan. Nothing changes when
    /// either check fails.
    pub(crate) fn close<T>(
        &self,
        resource_id: &ResourceId,
        now: i64,
        status: LoanStatus,
        check: impl FnOnce(&Loan) -> Result<T>,
    ) -> Result<(Loan, T)> {
        let not_found = || LendingError::NotFound(format!("loan for {}", resource_id));
        let mut loans = self.loans.get_mut(resource_id).ok_or_else(not_found)?;
        let loan = loans.last_mut().ok_or_else(not_found)?;

        if loan.status != LoanStatus::Active {
            return Err(LendingError::invalid_state(LoanStatus::Active, loan.status));
        }
        let value = check(loan)?;

        loan.status = status;
        loan.closed_at = Some(now);
        Ok((loan.clone(), value))
    }

    /// Newest loan of a resource, active or not
    pub fn get_loan(&self, resource_id: &ResourceId) -> Option<Loan> {
        self.loans
            .get(resource_id)
            .and_then(|loans| loans.last().cloned())
    }

    /// Every loan ever opened on a resource, oldest first
    pub fn loan_history(&self, resource_id: &ResourceId) -> Vec<Loan> {
        self.loans
            .get(resource_id)
            .map(|loans| loans.clone())
            .unwrap_or_default()
    }

    /// Snapshot of all active loans
    pub fn active_loans(&self) -> Vec<Loan> {
        self.loans
            .iter()
            .filter_map(|entry| entry.value().last().filter(|l| l.is_active()).cloned())
            .collect()
    }

    /// Interest attributable to the newest loan of a resource
    ///
    /// Active loans accrue up to now, capped at the deadline. Returned loans
    /// report what was charged. Liquidated loans owe nothing: the collateral
    /// was taken instead.
    pub fn interest_owed(&self, resource_id: &ResourceId) -> Result<Decimal> {
        let loan = self
            .get_loan(resource_id)
            .ok_or_else(|| LendingError::NotFound(format!("loan for {}", resource_id)))?;

        match loan.status {
            LoanStatus::Active => {
                let as_of = self.clock.now().min(loan.deadline());
                Self::calculate_interest_owed(&loan, as_of)
            }
            LoanStatus::Returned => {
                Self::calculate_interest_owed(&loan, loan.closed_at.unwrap_or(loan.start_time))
            }
            LoanStatus::Liquidated => Ok(Decimal::ZERO),
        }
    }

    pub(crate) fn registry(&self) -> &Arc<AssetRegistry> {
        &self.registry
    }

    pub(crate) fn settlement(&self) -> &Arc<dyn SettlementLedger> {
        &self.settlement
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn config(&self) -> &LendingConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::PricingConfig;
    use crate::reputation::InMemoryReputation;
    use crate::settlement::InMemorySettlement;
    use rust_decimal_macros::dec;

    const START: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    struct Fixture {
        ledger: LoanLedger,
        registry: Arc<AssetRegistry>,
        pricing: Arc<PricingEngine>,
        settlement: Arc<InMemorySettlement>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        fixture_with(PricingConfig::default(), LendingConfig::default(), dec!(10_000))
    }

    fn fixture_with(pricing: PricingConfig, lending: LendingConfig, funds: Decimal) -> Fixture {
        let clock = Arc::new(ManualClock::new(START));
        let registry = Arc::new(AssetRegistry::new(clock.clone()));
        let reputation = InMemoryReputation::new().with_score("bob", 100);
        let pricing = Arc::new(
            PricingEngine::new(pricing, registry.clone(), Arc::new(reputation)).unwrap(),
        );
        let settlement = Arc::new(InMemorySettlement::new());
        settlement.fund(&bob(), funds).unwrap();

        let ledger = LoanLedger::new(
            lending,
            registry.clone(),
            pricing.clone(),
            settlement.clone(),
            clock.clone(),
        )
        .unwrap();

        Fixture {
            ledger,
            registry,
            pricing,
            settlement,
            clock,
        }
    }

    fn alice() -> AccountId {
        AccountId::from("alice")
    }

    fn bob() -> AccountId {
        AccountId::from("bob")
    }

    fn request(resource: &str, collateral: Decimal) -> BorrowRequest {
        BorrowRequest {
            resource_id: ResourceId::from(resource),
            borrower: bob(),
            duration_secs: 10 * DAY,
            principal_value: dec!(1000),
            provided_collateral: collateral,
        }
    }

    #[test]
    fn test_interest_formula() {
        let loan = Loan {
            id: LoanId::generate(),
            resource_id: ResourceId::from("nft-1"),
            borrower: bob(),
            lender: alice(),
            principal_value: dec!(1000),
            start_time: START,
            max_duration_secs: SECONDS_PER_YEAR,
            collateral_amount: dec!(1500),
            origination_rate_bps: 1_000,
            config_version: 1,
            lock_id: LockId::generate(),
            status: LoanStatus::Active,
            closed_at: None,
        };

        let full_year = LoanLedger::calculate_interest_owed(&loan, START + SECONDS_PER_YEAR).unwrap();
        assert_eq!(full_year, dec!(100));
        let half_year =
            LoanLedger::calculate_interest_owed(&loan, START + SECONDS_PER_YEAR / 2).unwrap();
        assert_eq!(half_year, dec!(50));
        // Before start accrues nothing
        assert_eq!(LoanLedger::calculate_interest_owed(&loan, START - 10).unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_borrow_locks_collateral() {
        let fx = fixture();
        fx.registry.deposit(&alice(), &ResourceId::from("nft-1")).unwrap();

        let loan = fx.ledger.borrow(request("nft-1", dec!(1500))).await.unwrap();
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.origination_rate_bps, 500);
        assert_eq!(loan.lender, alice());
        assert_eq!(loan.start_time, START);
        assert_eq!(fx.settlement.locked(&bob()), dec!(1500));

        let record = fx.registry.get(&ResourceId::from("nft-1")).unwrap();
        assert_eq!(record.state, CustodyState::OnLoan);
        assert_eq!(fx.registry.stats().borrowed_count, 1);
    }

    #[tokio::test]
    async fn test_borrow_failures_leave_state_unchanged() {
        let fx = fixture();
        let id = ResourceId::from("nft-1");
        fx.registry.deposit(&alice(), &id).unwrap();
        let stats = fx.registry.stats();

        let err = fx.ledger.borrow(request("nft-1", dec!(1499))).await.unwrap_err();
        assert!(matches!(err, LendingError::InsufficientCollateral { .. }));

        let mut too_long = request("nft-1", dec!(1500));
        too_long.duration_secs = LendingConfig::default().max_duration_secs + 1;
        let err = fx.ledger.borrow(too_long).await.unwrap_err();
        assert!(matches!(err, LendingError::ArithmeticBounds(_)));

        let err = fx.ledger.borrow(request("ghost", dec!(1500))).await.unwrap_err();
        assert!(matches!(err, LendingError::NotFound(_)));

        assert_eq!(fx.registry.stats(), stats);
        assert!(fx.ledger.get_loan(&id).is_none());
        assert_eq!(fx.settlement.locked(&bob()), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_failed_lock_reverts_custody() {
        let fx = fixture();
        let id = ResourceId::from("nft-1");
        fx.registry.deposit(&alice(), &id).unwrap();

        // Bob only holds 10_000
        let err = fx.ledger.borrow(request("nft-1", dec!(20_000))).await.unwrap_err();
        assert!(matches!(err, LendingError::Escrow(_)));
        assert_eq!(fx.registry.get(&id).unwrap().state, CustodyState::Deposited);
        assert_eq!(fx.registry.stats().borrowed_count, 0);
        assert!(fx.ledger.get_loan(&id).is_none());
    }

    #[tokio::test]
    async fn test_second_borrow_rejected() {
        let fx = fixture();
        fx.registry.deposit(&alice(), &ResourceId::from("nft-1")).unwrap();

        fx.ledger.borrow(request("nft-1", dec!(1500))).await.unwrap();
        let err = fx.ledger.borrow(request("nft-1", dec!(1500))).await.unwrap_err();
        assert!(matches!(err, LendingError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_return_settles_interest() {
        let fx = fixture();
        let id = ResourceId::from("nft-1");
        fx.registry.deposit(&alice(), &id).unwrap();
        let loan = fx.ledger.borrow(request("nft-1", dec!(1500))).await.unwrap();

        fx.clock.advance(SECONDS_PER_YEAR / 100);
        let receipt = fx.ledger.return_loan(&id, &bob()).await.unwrap();

        // 1000 × 5% × 1/100 year
        assert_eq!(receipt.interest_owed, dec!(0.5));
        assert_eq!(receipt.fees.platform_share, dec!(0.05));
        assert_eq!(receipt.loan.status, LoanStatus::Returned);
        assert_eq!(receipt.loan.closed_at, Some(START + SECONDS_PER_YEAR / 100));

        assert_eq!(receipt.collateral_returned, dec!(1_499.5));
        assert_eq!(fx.settlement.available(&bob()), dec!(9_999.5));
        assert_eq!(fx.settlement.available(&alice()), dec!(0.45));
        assert_eq!(fx.settlement.available(&AccountId::from("treasury")), dec!(0.05));
        assert_eq!(fx.registry.get(&id).unwrap().state, CustodyState::Deposited);
        assert_eq!(fx.ledger.interest_owed(&id).unwrap(), dec!(0.5));
        assert_eq!(fx.ledger.loan_history(&id), vec![receipt.loan.clone()]);
        assert_eq!(loan.id, receipt.loan.id);
    }

    #[tokio::test]
    async fn test_return_interest_paid_from_collateral() {
        // Borrower holds nothing beyond the collateral it locks
        let fx = fixture_with(
            PricingConfig {
                base_rate_bps: 5_000,
                max_rate_bps: 5_000,
                ..Default::default()
            },
            LendingConfig {
                max_duration_secs: 3_650 * DAY,
                ..Default::default()
            },
            dec!(1500),
        );
        let id = ResourceId::from("nft-1");
        fx.registry.deposit(&alice(), &id).unwrap();
        let mut long = request("nft-1", dec!(1500));
        long.duration_secs = 3_650 * DAY;
        fx.ledger.borrow(long).await.unwrap();

        fx.clock.advance(3_000 * DAY);
        let receipt = fx.ledger.return_loan(&id, &bob()).await.unwrap();

        assert!(receipt.interest_owed > dec!(1500));
        assert_eq!(receipt.fees.total(), dec!(1500));
        assert_eq!(receipt.collateral_returned, Decimal::ZERO);
        assert_eq!(receipt.loan.status, LoanStatus::Returned);

        assert_eq!(fx.settlement.available(&alice()), dec!(1350));
        assert_eq!(fx.settlement.available(&AccountId::from("treasury")), dec!(150));
        assert_eq!(fx.settlement.available(&bob()), Decimal::ZERO);
        assert_eq!(fx.settlement.locked(&bob()), Decimal::ZERO);
        assert_eq!(fx.registry.get(&id).unwrap().state, CustodyState::Deposited);
    }

    #[tokio::test]
    async fn test_return_succeeds_with_collateral_only() {
        let fx = fixture_with(PricingConfig::default(), LendingConfig::default(), dec!(1500));
        let id = ResourceId::from("nft-1");
        fx.registry.deposit(&alice(), &id).unwrap();
        fx.ledger.borrow(request("nft-1", dec!(1500))).await.unwrap();

        fx.clock.advance(SECONDS_PER_YEAR / 100);
        let receipt = fx.ledger.return_loan(&id, &bob()).await.unwrap();

        assert_eq!(receipt.collateral_returned, dec!(1_499.5));
        assert_eq!(fx.settlement.available(&bob()), dec!(1_499.5));
        assert_eq!(fx.settlement.available(&alice()), dec!(0.45));
    }

    #[tokio::test]
    async fn test_return_rejections() {
        let fx = fixture();
        let id = ResourceId::from("nft-1");
        fx.registry.deposit(&alice(), &id).unwrap();
        fx.ledger.borrow(request("nft-1", dec!(1500))).await.unwrap();

        let err = fx.ledger.return_loan(&id, &alice()).await.unwrap_err();
        assert!(matches!(err, LendingError::NotBorrower { .. }));

        fx.clock.advance(10 * DAY + 1);
        let err = fx.ledger.return_loan(&id, &bob()).await.unwrap_err();
        assert!(matches!(err, LendingError::DeadlinePassed { .. }));
        assert!(fx.ledger.get_loan(&id).unwrap().is_active());
    }

    #[tokio::test]
    async fn test_origination_rate_is_locked() {
        let fx = fixture();
        let id = ResourceId::from("nft-0");
        fx.registry.deposit(&alice(), &id).unwrap();
        let loan = fx.ledger.borrow(request("nft-0", dec!(1500))).await.unwrap();
        fx.clock.advance(5 * DAY);
        let before = fx.ledger.interest_owed(&id).unwrap();

        // Push utilization to 100% and reprice the pool
        let other = ResourceId::from("nft-1");
        fx.registry.deposit(&alice(), &other).unwrap();
        fx.ledger.borrow(request("nft-1", dec!(1500))).await.unwrap();
        fx.pricing
            .update_config(PricingConfig {
                base_rate_bps: 4_000,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(fx.ledger.interest_owed(&id).unwrap(), before);
        assert_eq!(fx.ledger.get_loan(&id).unwrap().origination_rate_bps, loan.origination_rate_bps);
    }

    #[tokio::test]
    async fn test_accrual_capped_at_deadline() {
        let fx = fixture();
        let id = ResourceId::from("nft-1");
        fx.registry.deposit(&alice(), &id).unwrap();
        fx.ledger.borrow(request("nft-1", dec!(1500))).await.unwrap();

        fx.clock.advance(10 * DAY);
        let at_deadline = fx.ledger.interest_owed(&id).unwrap();
        fx.clock.advance(30 * DAY);
        assert_eq!(fx.ledger.interest_owed(&id).unwrap(), at_deadline);
        assert_eq!(fx.ledger.active_loans().len(), 1);
    }
}
