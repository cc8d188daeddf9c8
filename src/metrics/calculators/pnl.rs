//! Life-to-date profit and loss.

use super::{LtdPosition, NO_SNAPSHOT_REASON};
use crate::domain::Strategy;
use crate::history::HistoryStore;
use crate::metrics::calculator::{
    apply_round, base_meta, decimal_json, MetricCalculator, MetricError, WindowKind,
};
use crate::metrics::config::{parse_patch, RoundPatch};
use crate::metrics::MetricResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

const FORMULA: &str = "pnl = tvl + fees_collected - (deposits - withdrawals)";

/// Life-to-date profit and loss in USD.
#[derive(Debug, Clone, Default)]
pub struct PnlCalculator {
    round: Option<u32>,
}

impl PnlCalculator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricCalculator for PnlCalculator {
    fn key(&self) -> &str {
        "pnl"
    }

    async fn calculate(
        &self,
        strategy: &Strategy,
        at: DateTime<Utc>,
        history: &dyn HistoryStore,
    ) -> Result<MetricResult, MetricError> {
        let mut meta = base_meta(WindowKind::Ltd, at, FORMULA);

        let value = match LtdPosition::load(history, strategy, at).await? {
            Some(position) => {
                let pnl = position.pnl()?;
                meta.insert(
                    "components".to_string(),
                    json!({
                        "tvl": decimal_json(position.tvl),
                        "fees_collected": decimal_json(position.fees_collected),
                        "deposits_total": decimal_json(position.deposits),
                        "withdrawals_total": decimal_json(position.withdrawals),
                        "net_invested": decimal_json(position.net_invested()?),
                    }),
                );
                Some(pnl)
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
            display_name: "PNL".to_string(),
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
        "Profit and Loss (PNL) calculation"
    }

    fn unit(&self) -> String {
        "USD".to_string()
    }

    fn boxed(&self) -> Box<dyn MetricCalculator> {
        Box::new(self.clone())
    }
}
