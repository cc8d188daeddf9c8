//! Life-to-date sums of one transaction type.

use crate::domain::{Strategy, TransactionType};
use crate::history::{HistoryStore, TimeWindow};
use crate::metrics::calculator::{apply_round, base_meta, MetricCalculator, MetricError, WindowKind};
use crate::metrics::config::{parse_patch, DisplayConfig, DisplayPatch};
use crate::metrics::MetricResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Static description of one transaction total.
#[derive(Debug)]
pub struct TotalKind {
    pub key: &'static str,
    pub transaction_type: TransactionType,
    pub display_name: &'static str,
    pub description: &'static str,
    /// Whether `unit`/`round` may be overridden per strategy.
    pub configurable: bool,
}

pub const BORROW_PRINCIPAL_TOTAL: TotalKind = TotalKind {
    key: "borrow_principal_total",
    transaction_type: TransactionType::BorrowPrincipal,
    display_name: "Borrow Principal Total (LTD)",
    description: "Total borrowed principal amount in USD",
    configurable: true,
};

pub const REPAY_PRINCIPAL_TOTAL: TotalKind = TotalKind {
    key: "repay_principal_total",
    transaction_type: TransactionType::RepayPrincipal,
    display_name: "Repay Principal Total",
    description: "Total repaid principal amount in USD",
    configurable: true,
};

pub const FEES_COLLECTED: TotalKind = TotalKind {
    key: "fees_collected",
    transaction_type: TransactionType::CollectFees,
    display_name: "Fees Collected (LTD)",
    description: "Total fees collected by the strategy",
    configurable: true,
};

pub const WITHDRAWALS_TOTAL: TotalKind = TotalKind {
    key: "withdrawals_total",
    transaction_type: TransactionType::Withdraw,
    display_name: "Total Withdrawals (LTD)",
    description: "Total withdrawals amount in USD",
    configurable: true,
};

pub const LOAN_INTEREST_ACCRUED_TOTAL: TotalKind = TotalKind {
    key: "loan_interest_accrued_total",
    transaction_type: TransactionType::LoanInterestAccrued,
    display_name: "Loan Interest Accrued Total",
    description: "Total loan interest accrued amount in USD",
    configurable: false,
};

/// Sum of `total_value` over every transaction of one type up to and including `at`.
#[derive(Debug, Clone)]
pub struct TransactionTotalCalculator {
    kind: &'static TotalKind,
    config: DisplayConfig,
}

impl TransactionTotalCalculator {
    pub fn new(kind: &'static TotalKind) -> Self {
        Self {
            kind,
            config: DisplayConfig::with_unit("USD"),
        }
    }

    pub fn borrow_principal_total() -> Self {
        Self::new(&BORROW_PRINCIPAL_TOTAL)
    }

    pub fn repay_principal_total() -> Self {
        Self::new(&REPAY_PRINCIPAL_TOTAL)
    }

    pub fn fees_collected() -> Self {
        Self::new(&FEES_COLLECTED)
    }

    pub fn withdrawals_total() -> Self {
        Self::new(&WITHDRAWALS_TOTAL)
    }

    pub fn loan_interest_accrued_total() -> Self {
        Self::new(&LOAN_INTEREST_ACCRUED_TOTAL)
    }

    fn formula(&self) -> String {
        format!(
            "sum(transactions.total_value where type = {} and date <= to)",
            self.kind.transaction_type
        )
    }
}

#[async_trait]
impl MetricCalculator for TransactionTotalCalculator {
    fn key(&self) -> &str {
        self.kind.key
    }

    async fn calculate(
        &self,
        strategy: &Strategy,
        at: DateTime<Utc>,
        history: &dyn HistoryStore,
    ) -> Result<MetricResult, MetricError> {
        let total = history
            .sum_transactions(strategy.id, self.kind.transaction_type, TimeWindow::up_to(at))
            .await?;

        let mut meta = base_meta(WindowKind::Ltd, at, &self.formula());
        meta.insert("source".to_string(), Value::from("transactions.total_value"));
        meta.insert(
            "transaction_type".to_string(),
            Value::from(self.kind.transaction_type.as_str()),
        );
        if self.kind.configurable {
            meta.insert("applied_config".to_string(), self.config.applied());
        }

        Ok(MetricResult {
            key: self.kind.key.to_string(),
            value: apply_round(Some(total), self.config.round),
            unit: self.config.unit.clone(),
            display_name: self.kind.display_name.to_string(),
            meta: Value::Object(meta),
        })
    }

    fn set_config(&mut self, config: &Value) -> Result<(), MetricError> {
        if !self.kind.configurable {
            return Ok(());
        }
        if let Some(patch) = parse_patch::<DisplayPatch>(config)? {
            self.config.apply(patch);
        }
        Ok(())
    }

    fn description(&self) -> &str {
        self.kind.description
    }

    fn unit(&self) -> String {
        self.config.unit.clone()
    }

    fn boxed(&self) -> Box<dyn MetricCalculator> {
        Box::new(self.clone())
    }
}
