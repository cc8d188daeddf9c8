//! Directory of calculators keyed by metric key.

use super::calculators::default_calculators;
use super::{MetricCalculator, MetricError, MetricResult};
use crate::domain::Strategy;
use crate::history::HistoryStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Listing entry for one registered calculator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricInfo {
    pub label: String,
    pub unit: String,
    pub description: String,
}

/// Process-wide set of calculators, built once at startup and then shared read-only.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    calculators: BTreeMap<String, Box<dyn MetricCalculator>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in calculator.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for calculator in default_calculators() {
            registry.register(calculator);
        }
        registry
    }

    /// Insert `calculator`, replacing any previous one with the same key.
    pub fn register(&mut self, calculator: Box<dyn MetricCalculator>) {
        self.calculators
            .insert(calculator.key().to_string(), calculator);
    }

    pub fn has(&self, key: &str) -> bool {
        self.calculators.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.calculators.keys().map(String::as_str).collect()
    }

    pub fn get(&self, key: &str) -> Option<&dyn MetricCalculator> {
        self.calculators.get(key).map(|c| c.as_ref())
    }

    /// Fresh copy of the calculator for `key`, safe to configure without
    /// affecting the registered prototype.
    pub fn instantiate(&self, key: &str) -> Option<Box<dyn MetricCalculator>> {
        self.get(key).map(|c| c.boxed())
    }

    /// Compute the requested keys. Unknown keys are skipped.
    pub async fn calculate_for<'k>(
        &self,
        strategy: &Strategy,
        at: DateTime<Utc>,
        keys: impl IntoIterator<Item = &'k str>,
        history: &dyn HistoryStore,
    ) -> Result<BTreeMap<String, MetricResult>, MetricError> {
        let mut results = BTreeMap::new();
        for key in keys {
            let Some(calculator) = self.get(key) else {
                continue;
            };
            let result = calculator.calculate(strategy, at, history).await?;
            results.insert(key.to_string(), result);
        }
        Ok(results)
    }

    /// Compute every registered metric.
    pub async fn calculate_all(
        &self,
        strategy: &Strategy,
        at: DateTime<Utc>,
        history: &dyn HistoryStore,
    ) -> Result<BTreeMap<String, MetricResult>, MetricError> {
        self.calculate_for(strategy, at, self.keys(), history).await
    }

    /// Metadata for every calculator, sorted by key.
    pub fn list_all(&self) -> BTreeMap<String, MetricInfo> {
        self.calculators
            .iter()
            .map(|(key, calculator)| {
                (
                    key.clone(),
                    MetricInfo {
                        label: humanize_key(key),
                        unit: calculator.unit(),
                        description: calculator.description().to_string(),
                    },
                )
            })
            .collect()
    }
}

/// `"borrow_principal_total"` -> `"Borrow Principal Total"`, `"apr-farming"` -> `"Apr Farming"`.
pub fn humanize_key(key: &str) -> String {
    key.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, StrategyType, TransactionType};
    use crate::history::MemoryHistory;
    use crate::metrics::calculators::fixtures::{d, day, strategy};
    use crate::metrics::calculators::TransactionTotalCalculator;
    use async_trait::async_trait;
    use serde_json::Value;

    #[derive(Debug, Clone)]
    struct FixedCalculator {
        key: &'static str,
        value: Decimal,
    }

    #[async_trait]
    impl MetricCalculator for FixedCalculator {
        fn key(&self) -> &str {
            self.key
        }

        async fn calculate(
            &self,
            _strategy: &Strategy,
            _at: DateTime<Utc>,
            _history: &dyn HistoryStore,
        ) -> Result<MetricResult, MetricError> {
            Ok(MetricResult {
                key: self.key.to_string(),
                value: Some(self.value),
                unit: "USD".to_string(),
                display_name: "Fixed".to_string(),
                meta: Value::Null,
            })
        }

        fn set_config(&mut self, _config: &Value) -> Result<(), MetricError> {
            Ok(())
        }

        fn description(&self) -> &str {
            "fixed"
        }

        fn unit(&self) -> String {
            "USD".to_string()
        }

        fn boxed(&self) -> Box<dyn MetricCalculator> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn test_defaults_registered() {
        let registry = MetricsRegistry::with_defaults();
        for key in [
            "apr-farming",
            "apr-lending",
            "borrow_principal_total",
            "repay_principal_total",
            "fees_collected",
            "withdrawals_total",
            "loan_interest_accrued_total",
            "tvl",
            "pnl",
            "roi",
        ] {
            assert!(registry.has(key), "missing {}", key);
        }
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_register_overwrites_by_key() {
        let mut registry = MetricsRegistry::new();
        registry.register(Box::new(FixedCalculator { key: "tvl", value: d("1") }));
        registry.register(Box::new(FixedCalculator { key: "tvl", value: d("2") }));
        assert_eq!(registry.keys(), vec!["tvl"]);
    }

    #[tokio::test]
    async fn test_calculate_for_skips_unknown_keys() {
        let registry = MetricsRegistry::with_defaults();
        let s = strategy(StrategyType::Farming);
        let history = MemoryHistory::new();

        let results = registry
            .calculate_for(&s, day(1), ["nonexistent"], &history)
            .await
            .unwrap();
        assert!(results.is_empty());

        let results = registry
            .calculate_for(&s, day(1), ["tvl", "renamed_metric", "fees_collected"], &history)
            .await
            .unwrap();
        assert_eq!(results.keys().collect::<Vec<_>>(), vec!["fees_collected", "tvl"]);
    }

    #[tokio::test]
    async fn test_calculate_all_covers_every_key() {
        let registry = MetricsRegistry::with_defaults();
        let s = strategy(StrategyType::Farming);
        let history = MemoryHistory::new()
            .with_snapshot(s.id, day(0), d("1000"), d("0"))
            .with_transaction(s.id, TransactionType::Deposit, d("1000"), day(0));

        let results = registry.calculate_all(&s, day(30), &history).await.unwrap();
        assert_eq!(results.len(), registry.keys().len());
        assert_eq!(results["tvl"].value, Some(d("1000")));
    }

    #[tokio::test]
    async fn test_calculate_all_reports_overflow_as_error() {
        let registry = MetricsRegistry::with_defaults();
        let s = strategy(StrategyType::Farming);
        let history = MemoryHistory::new()
            .with_snapshot(s.id, day(0), d("1000"), d("0"))
            .with_transaction(s.id, TransactionType::Deposit, d("50000000000000000000000000000"), day(0))
            .with_transaction(s.id, TransactionType::Deposit, d("50000000000000000000000000000"), day(1));

        let err = registry.calculate_all(&s, day(30), &history).await.unwrap_err();
        assert!(matches!(err, MetricError::History(_)));
    }

    #[tokio::test]
    async fn test_instantiate_does_not_touch_prototype() {
        let registry = MetricsRegistry::with_defaults();
        let mut copy = registry.instantiate("fees_collected").unwrap();
        copy.set_config(&serde_json::json!({"unit": "EUR"})).unwrap();

        assert_eq!(copy.unit(), "EUR");
        assert_eq!(registry.get("fees_collected").unwrap().unit(), "USD");
        assert_eq!(
            TransactionTotalCalculator::fees_collected().unit(),
            registry.get("fees_collected").unwrap().unit()
        );
    }

    #[test]
    fn test_list_all_sorted_with_labels() {
        let registry = MetricsRegistry::with_defaults();
        let listing = registry.list_all();
        let keys: Vec<&String> = listing.keys().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        assert_eq!(listing["borrow_principal_total"].label, "Borrow Principal Total");
        assert_eq!(listing["apr-farming"].label, "Apr Farming");
        assert_eq!(listing["roi"].unit, "%");
        assert_eq!(listing["tvl"].description, "Total Value Locked (TVL) in USD");
    }

    #[test]
    fn test_humanize_key() {
        assert_eq!(humanize_key("tvl"), "Tvl");
        assert_eq!(humanize_key("loan_interest_accrued_total"), "Loan Interest Accrued Total");
        assert_eq!(humanize_key("a__b"), "A B");
    }
}
