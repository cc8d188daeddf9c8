//! Point-in-time measurements of a strategy's on-chain state.

use super::{Decimal, StrategyId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only measurement. Calculators read the latest one at or before a query instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: i64,
    pub strategy_id: StrategyId,
    pub snapshot_at: DateTime<Utc>,
    pub total_liquidity: Decimal,
    pub fees_uncollected: Decimal,
    pub current_loan_balance: Option<Decimal>,
    pub accrued_loan_interest: Option<Decimal>,
    pub overall_health_factor: Option<Decimal>,
}

impl Snapshot {
    /// Total value locked: liquidity plus fees not yet collected. `None` on overflow.
    pub fn tvl(&self) -> Option<Decimal> {
        self.total_liquidity.checked_add(self.fees_uncollected)
    }
}

/// Snapshot fields supplied by a writer; the id is assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSnapshot {
    pub snapshot_at: DateTime<Utc>,
    pub total_liquidity: Decimal,
    #[serde(default)]
    pub fees_uncollected: Decimal,
    #[serde(default)]
    pub current_loan_balance: Option<Decimal>,
    #[serde(default)]
    pub accrued_loan_interest: Option<Decimal>,
    #[serde(default)]
    pub overall_health_factor: Option<Decimal>,
}

impl NewSnapshot {
    pub fn new(snapshot_at: DateTime<Utc>, total_liquidity: Decimal, fees_uncollected: Decimal) -> Self {
        Self {
            snapshot_at,
            total_liquidity,
            fees_uncollected,
            current_loan_balance: None,
            accrued_loan_interest: None,
            overall_health_factor: None,
        }
    }

    pub fn into_snapshot(self, id: i64, strategy_id: StrategyId) -> Snapshot {
        Snapshot {
            id,
            strategy_id,
            snapshot_at: self.snapshot_at,
            total_liquidity: self.total_liquidity,
            fees_uncollected: self.fees_uncollected,
            current_loan_balance: self.current_loan_balance,
            accrued_loan_interest: self.accrued_loan_interest,
            overall_health_factor: self.overall_health_factor,
        }
    }
}
