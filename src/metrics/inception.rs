//! Life-to-date window start detection shared by the APR calculators.

use crate::domain::Strategy;
use crate::history::{HistoryError, HistoryStore};
use chrono::{DateTime, Duration, Utc};

pub const DAYS_PER_YEAR: i64 = 365;

/// Earliest known data point for `strategy` as of `at`.
///
/// Preference order: earliest snapshot at or before `at`, then earliest
/// transaction at or before `at`, then the strategy's creation time. An
/// inception after `at` is clamped to `at - 1 day`.
pub async fn detect_inception(
    history: &dyn HistoryStore,
    strategy: &Strategy,
    at: DateTime<Utc>,
) -> Result<DateTime<Utc>, HistoryError> {
    let detected = match history.earliest_snapshot_at(strategy.id, at).await? {
        Some(snapshot_at) => snapshot_at,
        None => history
            .earliest_transaction_at(strategy.id, at)
            .await?
            .unwrap_or(strategy.created_at),
    };

    if detected > at {
        return Ok(at - Duration::days(1));
    }
    Ok(detected)
}

/// Whole days between `from` and `to`, never less than 1.
pub fn ltd_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_days().max(1)
}
