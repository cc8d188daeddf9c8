//! Entry point for snapshot requests coming from history writes or callers.
//!
//! A request either runs the service inline or is queued for the background
//! [`SnapshotWorker`]. Both paths end in the same idempotent
//! [`StrategyMetricsService::snapshot`], so a job that runs twice is harmless.

use super::metrics_service::{ServiceError, StrategyMetricsService};
use crate::config::MetricsTriggerConfig;
use crate::db::Repository;
use crate::domain::{Snapshot, StrategyId, Transaction};
use crate::metrics::MetricResult;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

const QUEUE_CAPACITY: usize = 256;

/// A queued request to snapshot one strategy at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotJob {
    pub job_id: Uuid,
    pub strategy_id: StrategyId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Sync,
    Queued,
}

#[derive(Debug)]
pub enum SnapshotOutcome {
    Completed(BTreeMap<String, MetricResult>),
    Queued(Uuid),
}

/// Per-strategy result of [`MetricsTrigger::recalculate_all`].
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculationReport {
    pub succeeded: Vec<StrategyId>,
    pub failed: Vec<RecalculationFailure>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecalculationFailure {
    pub strategy_id: StrategyId,
    pub error: String,
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("snapshot queue closed")]
    QueueClosed,
}

#[derive(Clone)]
pub struct MetricsTrigger {
    service: Arc<StrategyMetricsService>,
    repo: Arc<Repository>,
    config: MetricsTriggerConfig,
    queue: mpsc::Sender<SnapshotJob>,
}

impl MetricsTrigger {
    /// Build a trigger and the worker that drains its queue. The caller spawns
    /// `worker.run()`; it exits once every trigger clone is dropped.
    pub fn new(
        service: Arc<StrategyMetricsService>,
        repo: Arc<Repository>,
        config: MetricsTriggerConfig,
    ) -> (Self, SnapshotWorker) {
        let (queue, jobs) = mpsc::channel(QUEUE_CAPACITY);
        let worker = SnapshotWorker {
            jobs,
            service: service.clone(),
        };
        (
            Self {
                service,
                repo,
                config,
                queue,
            },
            worker,
        )
    }

    pub async fn request_snapshot(
        &self,
        strategy_id: StrategyId,
        at: DateTime<Utc>,
        mode: DispatchMode,
    ) -> Result<SnapshotOutcome, TriggerError> {
        match mode {
            DispatchMode::Sync => {
                let results = self.service.snapshot_by_id(strategy_id, at).await?;
                Ok(SnapshotOutcome::Completed(results))
            }
            DispatchMode::Queued => {
                let job = SnapshotJob {
                    job_id: Uuid::new_v4(),
                    strategy_id,
                    at,
                };
                let job_id = job.job_id;
                self.queue
                    .send(job)
                    .await
                    .map_err(|_| TriggerError::QueueClosed)?;
                info!(job_id = %job_id, strategy_id = %strategy_id, at = %at, "Snapshot job queued");
                Ok(SnapshotOutcome::Queued(job_id))
            }
        }
    }

    /// Recalculate at the transaction's date if transaction triggers are on.
    pub async fn on_transaction_recorded(
        &self,
        transaction: &Transaction,
    ) -> Result<Option<SnapshotOutcome>, TriggerError> {
        if !self.config.trigger_on_transaction {
            return Ok(None);
        }
        let mode = dispatch_mode(self.config.sync_on_transaction);
        self.request_snapshot(transaction.strategy_id, transaction.transaction_date, mode)
            .await
            .map(Some)
    }

    /// Recalculate at the snapshot's instant if snapshot triggers are on.
    pub async fn on_snapshot_recorded(
        &self,
        snapshot: &Snapshot,
    ) -> Result<Option<SnapshotOutcome>, TriggerError> {
        if !self.config.trigger_on_snapshot {
            return Ok(None);
        }
        let mode = dispatch_mode(self.config.sync_on_snapshot);
        self.request_snapshot(snapshot.strategy_id, snapshot.snapshot_at, mode)
            .await
            .map(Some)
    }

    /// Snapshot every active strategy at `at`, concurrently. One strategy's
    /// failure is reported without affecting the others.
    pub async fn recalculate_all(
        &self,
        at: DateTime<Utc>,
    ) -> Result<RecalculationReport, TriggerError> {
        let strategies = self.repo.list_active_strategies().await?;

        let outcomes = join_all(strategies.iter().map(|strategy| async move {
            (strategy.id, self.service.snapshot(strategy, at).await)
        }))
        .await;

        let mut report = RecalculationReport::default();
        for (strategy_id, outcome) in outcomes {
            match outcome {
                Ok(_) => report.succeeded.push(strategy_id),
                Err(e) => {
                    error!(strategy_id = %strategy_id, error = %e, "Recalculation failed");
                    report.failed.push(RecalculationFailure {
                        strategy_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Recalculated active strategies"
        );
        Ok(report)
    }
}

fn dispatch_mode(sync: bool) -> DispatchMode {
    if sync {
        DispatchMode::Sync
    } else {
        DispatchMode::Queued
    }
}

/// Background consumer of queued [`SnapshotJob`]s.
pub struct SnapshotWorker {
    jobs: mpsc::Receiver<SnapshotJob>,
    service: Arc<StrategyMetricsService>,
}

impl SnapshotWorker {
    pub async fn run(mut self) {
        info!("Snapshot worker started");
        while let Some(job) = self.jobs.recv().await {
            self.process(&job).await;
        }
        info!("Snapshot worker stopped");
    }

    async fn process(&self, job: &SnapshotJob) {
        match self.service.snapshot_by_id(job.strategy_id, job.at).await {
            Ok(results) => info!(
                job_id = %job.job_id,
                strategy_id = %job.strategy_id,
                metrics = results.len(),
                "Snapshot job completed"
            ),
            Err(ServiceError::StrategyNotFound(_)) => warn!(
                job_id = %job.job_id,
                strategy_id = %job.strategy_id,
                "Snapshot job for unknown strategy, dropping"
            ),
            Err(e) => error!(
                job_id = %job.job_id,
                strategy_id = %job.strategy_id,
                error = %e,
                "Snapshot job failed"
            ),
        }
    }
}
