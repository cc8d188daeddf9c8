//! In-memory history store for tests and offline computation.

use super::{HistoryError, HistoryStore, TimeWindow};
use crate::domain::{Decimal, Snapshot, StrategyId, Transaction, TransactionType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// History store backed by plain vectors.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    transactions: Vec<Transaction>,
    snapshots: Vec<Snapshot>,
    unavailable: bool,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transaction(
        mut self,
        strategy_id: StrategyId,
        transaction_type: TransactionType,
        total_value: Decimal,
        transaction_date: DateTime<Utc>,
    ) -> Self {
        let id = self.transactions.len() as i64 + 1;
        self.transactions.push(Transaction {
            id,
            strategy_id,
            transaction_type,
            total_value,
            transaction_date,
        });
        self
    }

    pub fn with_snapshot(
        mut self,
        strategy_id: StrategyId,
        snapshot_at: DateTime<Utc>,
        total_liquidity: Decimal,
        fees_uncollected: Decimal,
    ) -> Self {
        let id = self.snapshots.len() as i64 + 1;
        self.snapshots.push(Snapshot {
            id,
            strategy_id,
            snapshot_at,
            total_liquidity,
            fees_uncollected,
            current_loan_balance: None,
            accrued_loan_interest: None,
            overall_health_factor: None,
        });
        self
    }

    /// Make every query fail, to exercise store-outage paths.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn check(&self) -> Result<(), HistoryError> {
        if self.unavailable {
            return Err(HistoryError::Unavailable("memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn sum_transactions(
        &self,
        strategy_id: StrategyId,
        transaction_type: TransactionType,
        window: TimeWindow,
    ) -> Result<Decimal, HistoryError> {
        self.check()?;
        Decimal::checked_sum(
            self.transactions
                .iter()
                .filter(|t| t.strategy_id == strategy_id)
                .filter(|t| t.transaction_type == transaction_type)
                .filter(|t| window.contains(t.transaction_date))
                .map(|t| t.total_value),
        )
        .ok_or(HistoryError::SumOverflow(transaction_type))
    }

    async fn latest_snapshot_at_or_before(
        &self,
        strategy_id: StrategyId,
        at: DateTime<Utc>,
    ) -> Result<Option<Snapshot>, HistoryError> {
        self.check()?;
        // Ties on snapshot_at resolve to the most recently recorded row, like ORDER BY snapshot_at DESC, id DESC.
        Ok(self
            .snapshots
            .iter()
            .filter(|s| s.strategy_id == strategy_id && s.snapshot_at <= at)
            .max_by_key(|s| (s.snapshot_at, s.id))
            .cloned())
    }

    async fn earliest_snapshot_at(
        &self,
        strategy_id: StrategyId,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, HistoryError> {
        self.check()?;
        Ok(self
            .snapshots
            .iter()
            .filter(|s| s.strategy_id == strategy_id && s.snapshot_at <= at)
            .map(|s| s.snapshot_at)
            .min())
    }

    async fn earliest_transaction_at(
        &self,
        strategy_id: StrategyId,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, HistoryError> {
        self.check()?;
        Ok(self
            .transactions
            .iter()
            .filter(|t| t.strategy_id == strategy_id && t.transaction_date <= at)
            .map(|t| t.transaction_date)
            .min())
    }
}
