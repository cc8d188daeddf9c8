//! Read access to a strategy's transaction and snapshot history.
//!
//! Calculators only ever issue the queries on [`HistoryStore`]; the SQLite
//! repository and [`MemoryHistory`] both implement it.

use crate::domain::{Decimal, Snapshot, StrategyId, TransactionType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod memory;

pub use memory::MemoryHistory;

/// Inclusive time window `[from, to]`; an open `from` means "since the beginning".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    /// Everything at or before `to`.
    pub fn up_to(to: DateTime<Utc>) -> Self {
        Self { from: None, to }
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to,
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && at <= self.to
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Sum of `total_value` for transactions of `transaction_type` inside `window`.
    ///
    /// Returns zero when nothing matches.
    async fn sum_transactions(
        &self,
        strategy_id: StrategyId,
        transaction_type: TransactionType,
        window: TimeWindow,
    ) -> Result<Decimal, HistoryError>;

    /// Latest snapshot with `snapshot_at <= at`.
    async fn latest_snapshot_at_or_before(
        &self,
        strategy_id: StrategyId,
        at: DateTime<Utc>,
    ) -> Result<Option<Snapshot>, HistoryError>;

    /// Earliest `snapshot_at <= at`.
    async fn earliest_snapshot_at(
        &self,
        strategy_id: StrategyId,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, HistoryError>;

    /// Earliest `transaction_date <= at`.
    async fn earliest_transaction_at(
        &self,
        strategy_id: StrategyId,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, HistoryError>;
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("history unavailable: {0}")]
    Unavailable(String),
    #[error("decimal overflow summing {0} transactions")]
    SumOverflow(TransactionType),
}
