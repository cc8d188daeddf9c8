//! The calculator capability shared by every metric, plus window and rounding helpers.

use super::MetricResult;
use crate::domain::{to_iso8601, Decimal, Strategy};
use crate::history::{HistoryError, HistoryStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// A point-in-time financial formula over a strategy's history.
///
/// `calculate` must not fail for missing data: it returns a result with
/// `value = None` and a `reason` in the metadata instead. Errors are reserved
/// for store failures.
#[async_trait]
pub trait MetricCalculator: Send + Sync + fmt::Debug {
    /// Stable identifier, also the persisted metric key.
    fn key(&self) -> &str;

    async fn calculate(
        &self,
        strategy: &Strategy,
        at: DateTime<Utc>,
        history: &dyn HistoryStore,
    ) -> Result<MetricResult, MetricError>;

    /// Merge the recognised options of `config` into this calculator's settings.
    ///
    /// Unrecognised keys are ignored. A recognised key with a value of the wrong
    /// type is rejected with [`MetricError::InvalidConfig`].
    fn set_config(&mut self, config: &Value) -> Result<(), MetricError>;

    fn description(&self) -> &str;

    fn unit(&self) -> String;

    /// Fresh copy carrying the current configuration.
    fn boxed(&self) -> Box<dyn MetricCalculator>;
}

#[derive(Debug, Error)]
pub enum MetricError {
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("invalid metric configuration: {0}")]
    InvalidConfig(String),
    #[error("calculation failed: {0}")]
    Failed(String),
}

/// Kind of time window a result covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// From inception up to and including `to`.
    Ltd,
    /// State as of `to`.
    Point,
}

impl WindowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Ltd => "ltd",
            WindowKind::Point => "point",
        }
    }
}

/// Metadata every result starts from: window kind, `to`, inclusivity and formula.
pub(crate) fn base_meta(window: WindowKind, to: DateTime<Utc>, formula: &str) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert("window".to_string(), Value::from(window.as_str()));
    meta.insert("to".to_string(), Value::from(to_iso8601(to)));
    meta.insert("inclusive".to_string(), Value::Bool(true));
    meta.insert("formula".to_string(), Value::from(formula));
    meta
}

pub(crate) fn decimal_json(value: Decimal) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

pub(crate) fn optional_decimal_json(value: Option<Decimal>) -> Value {
    value.map(decimal_json).unwrap_or(Value::Null)
}

/// Round to `round` decimal places when set. `None` values stay `None`.
pub(crate) fn apply_round(value: Option<Decimal>, round: Option<u32>) -> Option<Decimal> {
    match (value, round) {
        (Some(v), Some(dp)) => Some(v.round_half_away(dp)),
        (v, _) => v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_base_meta_contract_fields() {
        let to = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let meta = base_meta(WindowKind::Point, to, "tvl = a + b");
        assert_eq!(meta["window"], "point");
        assert_eq!(meta["to"], "2025-02-01T00:00:00+00:00");
        assert_eq!(meta["inclusive"], true);
        assert_eq!(meta["formula"], "tvl = a + b");
    }

    #[test]
    fn test_apply_round() {
        let raw = Some(Decimal::new(dec!(5.1267)));
        assert_eq!(apply_round(raw, Some(2)), Some(Decimal::new(dec!(5.13))));
        assert_eq!(apply_round(raw, None), raw);
        assert_eq!(apply_round(None, Some(2)), None);
    }
}
