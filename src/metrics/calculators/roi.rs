//! Life-to-date return on net invested capital.

use super::{overflow, LtdPosition, NO_SNAPSHOT_REASON};
use crate::domain::{Decimal, Strategy};
use crate::history::HistoryStore;
use crate::metrics::calculator::{
    apply_round, base_meta, decimal_json, MetricCalculator, MetricError, WindowKind,
};
use crate::metrics::config::{parse_patch, RoundPatch};
use crate::metrics::MetricResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

const FORMULA: &str = "roi% = pnl / (deposits - withdrawals) * 100";

/// Reason code when deposits minus withdrawals is zero or negative.
pub const NON_POSITIVE_NET_INVESTED_REASON: &str = "net_invested_not_positive";

/// Life-to-date return on net invested capital, in percent.
#[derive(Debug, Clone, Default)]
pub struct RoiCalculator {
    round: Option<u32>,
}

impl RoiCalculator {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricCalculator for RoiCalculator {
    fn key(&self) -> &str {
        "roi"
    }

    async fn calculate(
        &self,
        strategy: &Strategy,
        at: DateTime<Utc>,
        history: &dyn HistoryStore,
    ) -> Result<MetricResult, MetricError> {
        let mut meta = base_meta(WindowKind::Ltd, at, FORMULA);
        meta.insert(
            "guard".to_string(),
            Value::from("returns null when net_invested <= 0"),
        );

        let value = match LtdPosition::load(history, strategy, at).await? {
            Some(position) => {
                let pnl = position.pnl()?;
                let net_invested = position.net_invested()?;
                meta.insert(
                    "components".to_string(),
                    json!({
                        "pnl_usd": decimal_json(pnl),
                        "net_invested": decimal_json(net_invested),
                        "tvl": decimal_json(position.tvl),
                        "fees_collected": decimal_json(position.fees_collected),
                        "deposits_total": decimal_json(position.deposits),
                        "withdrawals_total": decimal_json(position.withdrawals),
                    }),
                );
                if net_invested.is_positive() {
                    let percent = pnl
                        .checked_div(net_invested)
                        .and_then(|ratio| ratio.checked_mul(Decimal::hundred()))
                        .ok_or_else(|| overflow("roi"))?;
                    Some(percent)
                } else {
                    meta.insert(
                        "reason".to_string(),
                        Value::from(NON_POSITIVE_NET_INVESTED_REASON),
                    );
                    None
                }
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
            display_name: "ROI".to_string(),
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
        "Return on Investment (ROI) percentage"
    }

    fn unit(&self) -> String {
        "%".to_string()
    }

    fn boxed(&self) -> Box<dyn MetricCalculator> {
        Box::new(self.clone())
    }
}
