use crate::domain::{Decimal, StrategyId, StrategyMetricResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable output of one calculator run.
///
/// `value == None` means the metric is undefined for the current inputs;
/// `meta["reason"]` then says why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricResult {
    pub key: String,
    pub value: Option<Decimal>,
    pub unit: String,
    pub display_name: String,
    pub meta: serde_json::Value,
}

impl MetricResult {
    pub fn reason(&self) -> Option<&str> {
        self.meta.get("reason").and_then(|r| r.as_str())
    }

    /// Storage row for this result at `snapshot_at`.
    pub fn to_row(&self, strategy_id: StrategyId, snapshot_at: DateTime<Utc>) -> StrategyMetricResult {
        StrategyMetricResult {
            strategy_id,
            metric_key: self.key.clone(),
            snapshot_at,
            value: self.value,
            unit: self.unit.clone(),
            meta: self.meta.clone(),
        }
    }
}
