//! Lending APR over the life-to-date window.

use super::{annualized_percent, overflow, tvl_at};
use crate::domain::{to_iso8601, Decimal, Strategy, TransactionType};
use crate::history::{HistoryStore, TimeWindow};
use crate::metrics::calculator::{
    apply_round, base_meta, decimal_json, MetricCalculator, MetricError, WindowKind,
};
use crate::metrics::config::{parse_patch, LendingConfig, LendingPatch};
use crate::metrics::inception::{detect_inception, ltd_days};
use crate::metrics::MetricResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

const FORMULA: &str = "apr_ltd = (fees / avg_liquidity) * (365 / days) * 100";

/// Reason code when the averaged liquidity is zero or negative.
pub const NO_LIQUIDITY_REASON: &str = "avg_liquidity_not_positive";

/// `(fees / avg_liquidity) * (365 / days) * 100` with
/// `avg_liquidity = (TVL(inception) + TVL(at)) / 2`.
#[derive(Debug, Clone, Default)]
pub struct AprLendingCalculator {
    config: LendingConfig,
}

impl AprLendingCalculator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricCalculator for AprLendingCalculator {
    fn key(&self) -> &str {
        "apr-lending"
    }

    async fn calculate(
        &self,
        strategy: &Strategy,
        at: DateTime<Utc>,
        history: &dyn HistoryStore,
    ) -> Result<MetricResult, MetricError> {
        let from = detect_inception(history, strategy, at).await?;
        let days = ltd_days(from, at);

        // TODO: honour include_pending once transactions carry a settlement status.
        let fees = history
            .sum_transactions(
                strategy.id,
                TransactionType::CollectFees,
                TimeWindow::between(from, at),
            )
            .await?;

        let start_tvl = tvl_at(history, strategy, from).await?;
        let end_tvl = tvl_at(history, strategy, at).await?;
        let avg_liquidity = start_tvl
            .checked_add(end_tvl)
            .and_then(|sum| sum.checked_div(Decimal::from_i64(2)))
            .ok_or_else(|| overflow("avg_liquidity"))?;

        let mut meta = base_meta(WindowKind::Ltd, at, FORMULA);
        meta.insert("calculator_type".to_string(), Value::from("lending"));
        meta.insert("from".to_string(), Value::from(to_iso8601(from)));
        meta.insert("days".to_string(), Value::from(days));
        meta.insert("fees".to_string(), decimal_json(fees));
        meta.insert("start_tvl".to_string(), decimal_json(start_tvl));
        meta.insert("end_tvl".to_string(), decimal_json(end_tvl));
        meta.insert("avg_liquidity".to_string(), decimal_json(avg_liquidity));
        meta.insert("applied_config".to_string(), self.config.applied());

        let apr = if avg_liquidity.is_positive() {
            annualized_percent(fees, avg_liquidity, days)?
        } else {
            meta.insert("reason".to_string(), Value::from(NO_LIQUIDITY_REASON));
            None
        };

        Ok(MetricResult {
            key: self.key().to_string(),
            value: apply_round(apr, self.config.display.round),
            unit: self.unit(),
            display_name: "APR (Lending, LTD)".to_string(),
            meta: Value::Object(meta),
        })
    }

    fn set_config(&mut self, config: &Value) -> Result<(), MetricError> {
        if let Some(patch) = parse_patch::<LendingPatch>(config)? {
            self.config.apply(patch);
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "Annual Percentage Rate (LTD) for lending strategies based on collected fees and average liquidity since inception"
    }

    fn unit(&self) -> String {
        self.config.display.unit.clone()
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
    use serde_json::json;

    #[tokio::test]
    async fn test_apr_uses_average_of_start_and_end_tvl() {
        let s = strategy(StrategyType::Lending);
        let history = MemoryHistory::new()
            .with_snapshot(s.id, day(0), d("900"), d("0"))
            .with_snapshot(s.id, day(73), d("1090"), d("10"))
            .with_transaction(s.id, TransactionType::CollectFees, d("10"), day(40));

        let result = AprLendingCalculator::new()
            .calculate(&s, day(73), &history)
            .await
            .unwrap();
        // avg = (900 + 1100) / 2 = 1000; 10 / 1000 * 365 / 73 * 100 = 5
        assert_eq!(result.value, Some(d("5")));
        assert_eq!(result.meta["avg_liquidity"], 1000.0);
        assert_eq!(result.meta["days"], 73);
        assert_eq!(result.unit, "%");
    }

    #[tokio::test]
    async fn test_null_when_no_liquidity() {
        let s = strategy(StrategyType::Lending);
        let history = MemoryHistory::new().with_transaction(s.id, TransactionType::CollectFees, d("10"), day(5));

        let result = AprLendingCalculator::new()
            .calculate(&s, day(30), &history)
            .await
            .unwrap();
        assert_eq!(result.value, None);
        assert_eq!(result.reason(), Some(NO_LIQUIDITY_REASON));
    }

    #[tokio::test]
    async fn test_include_pending_is_echoed_but_inert() {
        let s = strategy(StrategyType::Lending);
        let history = MemoryHistory::new()
            .with_snapshot(s.id, day(0), d("1000"), d("0"))
            .with_transaction(s.id, TransactionType::CollectFees, d("10"), day(73));

        let plain = AprLendingCalculator::new()
            .calculate(&s, day(73), &history)
            .await
            .unwrap();

        let mut calc = AprLendingCalculator::new();
        calc.set_config(&json!({"include_pending": true, "unit": "pct"})).unwrap();
        let pending = calc.calculate(&s, day(73), &history).await.unwrap();

        assert_eq!(plain.value, pending.value);
        assert_eq!(pending.meta["applied_config"]["include_pending"], true);
        assert_eq!(pending.unit, "pct");
    }

    #[tokio::test]
    async fn test_malformed_config_is_rejected() {
        let mut calc = AprLendingCalculator::new();
        let err = calc.set_config(&json!({"include_pending": "yes"})).unwrap_err();
        assert!(matches!(err, MetricError::InvalidConfig(_)));
        assert_eq!(calc.unit(), "%");
    }
}
