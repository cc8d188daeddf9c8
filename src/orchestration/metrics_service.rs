use crate::db::Repository;
use crate::domain::{Strategy, StrategyId};
use crate::metrics::{MetricError, MetricResult, MetricsRegistry};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Computes a strategy's configured metrics and persists them per snapshot instant.
pub struct StrategyMetricsService {
    registry: Arc<MetricsRegistry>,
    repo: Arc<Repository>,
}

impl StrategyMetricsService {
    pub fn new(registry: Arc<MetricsRegistry>, repo: Arc<Repository>) -> Self {
        Self { registry, repo }
    }

    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }

    /// Compute every enabled metric for `strategy` at `at`.
    ///
    /// Config rows naming an unregistered key are skipped with a warning. A
    /// calculator that fails (bad config, store error, panic) is logged and
    /// left out; the rest of the batch still runs. Only failing to load the
    /// config rows themselves is an error.
    pub async fn calculate_metrics(
        &self,
        strategy: &Strategy,
        at: DateTime<Utc>,
    ) -> Result<BTreeMap<String, MetricResult>, ServiceError> {
        let configs = self.repo.list_enabled_metric_configs(strategy.id).await?;
        let mut results = BTreeMap::new();

        for config in configs {
            let key = config.metric_key.as_str();
            let Some(mut calculator) = self.registry.instantiate(key) else {
                warn!(
                    strategy_id = %strategy.id,
                    metric_key = key,
                    "Metric key not registered, skipping"
                );
                continue;
            };

            if let Err(e) = calculator.set_config(&config.custom_config) {
                error!(
                    strategy_id = %strategy.id,
                    metric_key = key,
                    error = %e,
                    "Rejected metric configuration, skipping"
                );
                continue;
            }

            let outcome = AssertUnwindSafe(calculator.calculate(strategy, at, self.repo.as_ref()))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(result)) => {
                    debug!(strategy_id = %strategy.id, metric_key = key, "Metric calculated");
                    results.insert(config.metric_key.clone(), result);
                }
                Ok(Err(e)) => {
                    error!(
                        strategy_id = %strategy.id,
                        metric_key = key,
                        error = %e,
                        "Metric calculation failed, skipping"
                    );
                }
                Err(panic) => {
                    let e = MetricError::Failed(panic_message(panic.as_ref()));
                    error!(
                        strategy_id = %strategy.id,
                        metric_key = key,
                        error = %e,
                        "Metric calculator panicked, skipping"
                    );
                }
            }
        }

        Ok(results)
    }

    /// Compute and store the metric set for `(strategy, at)`.
    ///
    /// Previously stored rows for the same instant are replaced atomically, so
    /// repeating the call leaves one row per computed key.
    pub async fn snapshot(
        &self,
        strategy: &Strategy,
        at: DateTime<Utc>,
    ) -> Result<BTreeMap<String, MetricResult>, ServiceError> {
        let results = self.calculate_metrics(strategy, at).await?;

        let rows: Vec<_> = results
            .values()
            .map(|result| result.to_row(strategy.id, at))
            .collect();
        let written = self
            .repo
            .replace_metric_results(strategy.id, at, &rows)
            .await?;

        info!(
            strategy_id = %strategy.id,
            at = %at,
            metrics = written,
            "Metric snapshot stored"
        );
        Ok(results)
    }

    /// [`snapshot`](Self::snapshot) for a strategy looked up by id.
    pub async fn snapshot_by_id(
        &self,
        strategy_id: StrategyId,
        at: DateTime<Utc>,
    ) -> Result<BTreeMap<String, MetricResult>, ServiceError> {
        let strategy = self
            .repo
            .get_strategy(strategy_id)
            .await?
            .ok_or(ServiceError::StrategyNotFound(strategy_id))?;
        self.snapshot(&strategy, at).await
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "calculator panicked".to_string()
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("strategy {0} not found")]
    StrategyNotFound(StrategyId),
}
