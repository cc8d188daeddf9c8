//! Per-strategy metric configuration rows and persisted metric results.

use super::{Decimal, StrategyId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which metric a strategy tracks, in which order, with which calculator options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyMetricConfig {
    pub id: i64,
    pub strategy_id: StrategyId,
    pub metric_key: String,
    pub is_enabled: bool,
    /// Free-form options handed to the calculator's `set_config`.
    pub custom_config: serde_json::Value,
    pub order: Option<i64>,
}

/// Stored output of one calculator run, unique per (strategy, metric key, snapshot_at).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyMetricResult {
    pub strategy_id: StrategyId,
    pub metric_key: String,
    pub snapshot_at: DateTime<Utc>,
    pub value: Option<Decimal>,
    pub unit: String,
    pub meta: serde_json::Value,
}
