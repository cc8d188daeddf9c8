//! Point-in-time total value locked.

use super::{overflow, NO_SNAPSHOT_REASON};
use crate::domain::{to_iso8601, Strategy};
use crate::history::HistoryStore;
use crate::metrics::calculator::{
    apply_round, base_meta, decimal_json, MetricCalculator, MetricError, WindowKind,
};
use crate::metrics::config::{parse_patch, RoundPatch};
use crate::metrics::MetricResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

const FORMULA: &str = "tvl = total_liquidity + fees_uncollected";

/// Total value locked from the latest snapshot at or before `at`.
#[derive(Debug, Clone, Default)]
pub struct TvlCalculator {
    round: Option<u32>,
}

impl TvlCalculator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricCalculator for TvlCalculator {
    fn key(&self) -> &str {
        "tvl"
    }

    async fn calculate(
        &self,
        strategy: &Strategy,
        at: DateTime<Utc>,
        history: &dyn HistoryStore,
    ) -> Result<MetricResult, MetricError> {
        let mut meta = base_meta(WindowKind::Point, at, FORMULA);
        meta.insert(
            "source".to_string(),
            Value::from("snapshots.total_liquidity + snapshots.fees_uncollected"),
        );

        let snapshot = history.latest_snapshot_at_or_before(strategy.id, at).await?;
        let value = match snapshot {
            Some(snapshot) => {
                meta.insert("snapshot_id".to_string(), Value::from(snapshot.id));
                meta.insert(
                    "snapshot_at".to_string(),
                    Value::from(to_iso8601(snapshot.snapshot_at)),
                );
                meta.insert(
                    "components".to_string(),
                    json!({
                        "total_liquidity": decimal_json(snapshot.total_liquidity),
                        "fees_uncollected": decimal_json(snapshot.fees_uncollected),
                    }),
                );
                Some(snapshot.tvl().ok_or_else(|| overflow("tvl"))?)
            }
            None => {
                meta.insert("reason".to_string(), Value::from(NO_SNAPSHOT_REASON));
                None
            }
        };

        Ok(MetricResult {
            key: self.key().to_string(),
            value: apply_round(value, self.round),
            unit: self.unit(),
            display_name: "TVL".to_string(),
            meta: Value::Object(meta),
        })
    }

    fn set_config(&mut self, config: &Value) -> Result<(), MetricError> {
        if let Some(RoundPatch { round: Some(round) }) = parse_patch::<RoundPatch>(config)? {
            self.round = round;
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "Total Value Locked (TVL) in USD"
    }

    fn unit(&self) -> String {
        "USD".to_string()
    }

    fn boxed(&self) -> Box<dyn MetricCalculator> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StrategyType;
    use crate::history::MemoryHistory;
    use crate::metrics::calculators::fixtures::{d, day, strategy};

    #[tokio::test]
    async fn test_tvl_uses_latest_snapshot_at_or_before() {
        let s = strategy(StrategyType::Farming);
        let history = MemoryHistory::new()
            .with_snapshot(s.id, day(0), d("1000"), d("0"))
            .with_snapshot(s.id, day(10), d("1200"), d("7.5"))
            .with_snapshot(s.id, day(20), d("5000"), d("0"));

        let result = TvlCalculator::new().calculate(&s, day(15), &history).await.unwrap();
        assert_eq!(result.value, Some(d("1207.5")));
        assert_eq!(result.meta["window"], "point");
        assert_eq!(result.meta["snapshot_id"], 2);
        assert_eq!(result.meta["components"]["fees_uncollected"], 7.5);

        let exact = TvlCalculator::new().calculate(&s, day(20), &history).await.unwrap();
        assert_eq!(exact.value, Some(d("5000")));
    }

    #[tokio::test]
    async fn test_tvl_without_snapshot_is_null_with_reason() {
        let s = strategy(StrategyType::Farming);
        let history = MemoryHistory::new().with_snapshot(s.id, day(10), d("1"), d("1"));

        let result = TvlCalculator::new().calculate(&s, day(5), &history).await.unwrap();
        assert_eq!(result.value, None);
        assert_eq!(result.reason(), Some(NO_SNAPSHOT_REASON));
        assert_eq!(result.unit, "USD");
    }

    #[tokio::test]
    async fn test_tvl_overflow_is_a_calculation_error() {
        let s = strategy(StrategyType::Farming);
        let big = d("50000000000000000000000000000");
        let history = MemoryHistory::new().with_snapshot(s.id, day(0), big, big);

        let err = TvlCalculator::new().calculate(&s, day(0), &history).await.unwrap_err();
        assert!(matches!(err, MetricError::Failed(msg) if msg.contains("tvl")));
    }
}
