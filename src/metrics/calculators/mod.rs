//! The built-in calculator set.

pub mod apr_farming;
pub mod apr_lending;
pub mod pnl;
pub mod roi;
pub mod totals;
pub mod tvl;

pub use apr_farming::AprFarmingCalculator;
pub use apr_lending::AprLendingCalculator;
pub use pnl::PnlCalculator;
pub use roi::RoiCalculator;
pub use totals::TransactionTotalCalculator;
pub use tvl::TvlCalculator;

use super::{MetricCalculator, MetricError};
use crate::domain::{Decimal, Strategy, TransactionType};
use crate::history::{HistoryStore, TimeWindow};
use chrono::{DateTime, Utc};

/// Reason code for results that need a snapshot and have none at or before `to`.
pub const NO_SNAPSHOT_REASON: &str = "no_snapshot_before_or_at_to";

/// Every calculator the registry knows about by default.
pub fn default_calculators() -> Vec<Box<dyn MetricCalculator>> {
    vec![
        Box::new(AprFarmingCalculator::new()),
        Box::new(AprLendingCalculator::new()),
        Box::new(TransactionTotalCalculator::borrow_principal_total()),
        Box::new(TransactionTotalCalculator::repay_principal_total()),
        Box::new(TransactionTotalCalculator::fees_collected()),
        Box::new(TransactionTotalCalculator::withdrawals_total()),
        Box::new(TransactionTotalCalculator::loan_interest_accrued_total()),
        Box::new(TvlCalculator::new()),
        Box::new(PnlCalculator::new()),
        Box::new(RoiCalculator::new()),
    ]
}

/// Life-to-date capital position shared by PNL and ROI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LtdPosition {
    pub tvl: Decimal,
    pub deposits: Decimal,
    pub withdrawals: Decimal,
    pub fees_collected: Decimal,
}

impl LtdPosition {
    /// Loads the position at `at`, or `None` when no snapshot exists at or before `at`.
    pub async fn load(
        history: &dyn HistoryStore,
        strategy: &Strategy,
        at: DateTime<Utc>,
    ) -> Result<Option<Self>, MetricError> {
        let Some(snapshot) = history.latest_snapshot_at_or_before(strategy.id, at).await? else {
            return Ok(None);
        };

        let window = TimeWindow::up_to(at);
        let deposits = history
            .sum_transactions(strategy.id, TransactionType::Deposit, window)
            .await?;
        let withdrawals = history
            .sum_transactions(strategy.id, TransactionType::Withdraw, window)
            .await?;
        let fees_collected = history
            .sum_transactions(strategy.id, TransactionType::CollectFees, window)
            .await?;

        Ok(Some(Self {
            tvl: snapshot.tvl().ok_or_else(|| overflow("tvl"))?,
            deposits,
            withdrawals,
            fees_collected,
        }))
    }

    pub fn net_invested(&self) -> Result<Decimal, MetricError> {
        self.deposits
            .checked_sub(self.withdrawals)
            .ok_or_else(|| overflow("net_invested"))
    }

    pub fn pnl(&self) -> Result<Decimal, MetricError> {
        let net_invested = self.net_invested()?;
        self.tvl
            .checked_add(self.fees_collected)
            .and_then(|gross| gross.checked_sub(net_invested))
            .ok_or_else(|| overflow("pnl"))
    }
}

/// Calculation error for an intermediate value outside the decimal range.
pub(crate) fn overflow(what: &str) -> MetricError {
    MetricError::Failed(format!("decimal overflow computing {}", what))
}

/// TVL at `at` from the latest snapshot at or before it; zero when there is none.
pub(crate) async fn tvl_at(
    history: &dyn HistoryStore,
    strategy: &Strategy,
    at: DateTime<Utc>,
) -> Result<Decimal, MetricError> {
    match history.latest_snapshot_at_or_before(strategy.id, at).await? {
        Some(snapshot) => snapshot.tvl().ok_or_else(|| overflow("tvl")),
        None => Ok(Decimal::zero()),
    }
}

/// `gain / base * (365 / days) * 100`, or `None` when `base` is zero.
pub(crate) fn annualized_percent(
    gain: Decimal,
    base: Decimal,
    days: i64,
) -> Result<Option<Decimal>, MetricError> {
    let numerator = gain
        .checked_mul(Decimal::from_i64(super::inception::DAYS_PER_YEAR))
        .and_then(|n| n.checked_mul(Decimal::hundred()))
        .ok_or_else(|| overflow("annualized numerator"))?;
    let denominator = base
        .checked_mul(Decimal::from_i64(days))
        .ok_or_else(|| overflow("annualized denominator"))?;
    if denominator.is_zero() {
        return Ok(None);
    }
    numerator
        .checked_div(denominator)
        .map(Some)
        .ok_or_else(|| overflow("annualized ratio"))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::domain::{Decimal, Strategy, StrategyId, StrategyType};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::str::FromStr;

    pub fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    pub fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    pub fn strategy(strategy_type: StrategyType) -> Strategy {
        Strategy::new(StrategyId::new(7), "fixture", strategy_type, day(0))
    }
}
