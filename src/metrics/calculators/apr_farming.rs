//! Farming APR over the life-to-date window.

use super::{annualized_percent, overflow};
use crate::domain::{to_iso8601, Decimal, Strategy, TransactionType};
use crate::history::{HistoryStore, TimeWindow};
use crate::metrics::calculator::{
    apply_round, base_meta, decimal_json, optional_decimal_json, MetricCalculator, MetricError,
    WindowKind,
};
use crate::metrics::config::{parse_patch, FarmingConfig, FarmingPatch};
use crate::metrics::inception::{detect_inception, ltd_days};
use crate::metrics::MetricResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

const FORMULA: &str = "apr_ltd = (rewards + il) / initial_investment * (365 / days) * 100";

/// Reason code when there is no positive deposit base to annualize against.
pub const NO_INITIAL_INVESTMENT_REASON: &str = "initial_investment_not_positive";

/// `(rewards + impermanent_loss) / initial_investment * (365 / days) * 100`.
///
/// Rewards are fees collected inside `[inception, at]`; the investment base is
/// every deposit up to `at`.
#[derive(Debug, Clone, Default)]
pub struct AprFarmingCalculator {
    config: FarmingConfig,
}

impl AprFarmingCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Impermanent loss is not modelled; the component is always zero.
    fn impermanent_loss(&self) -> Decimal {
        Decimal::zero()
    }
}

#[async_trait]
impl MetricCalculator for AprFarmingCalculator {
    fn key(&self) -> &str {
        "apr-farming"
    }

    async fn calculate(
        &self,
        strategy: &Strategy,
        at: DateTime<Utc>,
        history: &dyn HistoryStore,
    ) -> Result<MetricResult, MetricError> {
        let from = detect_inception(history, strategy, at).await?;
        let days = ltd_days(from, at);

        let rewards = history
            .sum_transactions(
                strategy.id,
                TransactionType::CollectFees,
                TimeWindow::between(from, at),
            )
            .await?;
        let impermanent_loss = if self.config.include_il {
            self.impermanent_loss()
        } else {
            Decimal::zero()
        };
        let initial_investment = history
            .sum_transactions(strategy.id, TransactionType::Deposit, TimeWindow::up_to(at))
            .await?;

        let mut meta = base_meta(WindowKind::Ltd, at, FORMULA);
        meta.insert("calculator_type".to_string(), Value::from("farming"));
        meta.insert("from".to_string(), Value::from(to_iso8601(from)));
        meta.insert("days".to_string(), Value::from(days));
        meta.insert("rewards".to_string(), decimal_json(rewards));
        meta.insert("impermanent_loss".to_string(), decimal_json(impermanent_loss));
        meta.insert("initial_investment".to_string(), decimal_json(initial_investment));

        let (apr, total_return) = if initial_investment.is_positive() {
            let total_return = rewards
                .checked_add(impermanent_loss)
                .ok_or_else(|| overflow("total_return"))?;
            (
                annualized_percent(total_return, initial_investment, days)?,
                Some(total_return),
            )
        } else {
            meta.insert("reason".to_string(), Value::from(NO_INITIAL_INVESTMENT_REASON));
            (None, None)
        };
        meta.insert("total_return".to_string(), optional_decimal_json(total_return));
        meta.insert("applied_config".to_string(), self.config.applied());

        Ok(MetricResult {
            key: self.key().to_string(),
            value: apply_round(apr, self.config.display.round),
            unit: self.unit(),
            display_name: "APR (Farming, LTD)".to_string(),
            meta: Value::Object(meta),
        })
    }

    fn set_config(&mut self, config: &Value) -> Result<(), MetricError> {
        if let Some(patch) = parse_patch::<FarmingPatch>(config)? {
            self.config.apply(patch);
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "Annual Percentage Rate (LTD) for farming strategies based on rewards and optional impermanent loss since inception"
    }

    fn unit(&self) -> String {
        self.config.display.unit.clone()
    }

    fn boxed(&self) -> Box<dyn MetricCalculator> {
        Box::new(self.clone())
    }
}
