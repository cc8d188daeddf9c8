use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::api::AppState;
use crate::domain::{StrategyId, StrategyMetricConfig, StrategyMetricResult};
use crate::error::AppError;
use crate::metrics::{MetricError, MetricInfo, MetricResult};
use crate::orchestration::{DispatchMode, RecalculationReport, SnapshotOutcome};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub strategy_id: StrategyId,
    pub at: DateTime<Utc>,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BTreeMap<String, MetricResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SnapshotResponse {
    pub fn from_outcome(strategy_id: StrategyId, at: DateTime<Utc>, outcome: SnapshotOutcome) -> Self {
        match outcome {
            SnapshotOutcome::Completed(metrics) => Self {
                strategy_id,
                at,
                status: "completed",
                job_id: None,
                metrics: Some(metrics),
                error: None,
            },
            SnapshotOutcome::Queued(job_id) => Self {
                strategy_id,
                at,
                status: "queued",
                job_id: Some(job_id),
                metrics: None,
                error: None,
            },
        }
    }

    /// A triggered snapshot that could not be run or queued.
    pub fn failed(strategy_id: StrategyId, at: DateTime<Utc>, error: String) -> Self {
        Self {
            strategy_id,
            at,
            status: "failed",
            job_id: None,
            metrics: None,
            error: Some(error),
        }
    }
}

pub async fn list_metrics(State(state): State<AppState>) -> Json<BTreeMap<String, MetricInfo>> {
    Json(state.registry.list_all())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricConfigRequest {
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
    #[serde(default)]
    pub custom_config: Value,
    pub order: Option<i64>,
}

fn default_enabled() -> bool {
    true
}

/// Create or replace one metric's configuration row for a strategy.
///
/// The key must be registered and `customConfig` must be accepted by that
/// calculator; stored rows with stale keys are still tolerated at calculation time.
pub async fn put_metric_config(
    Path((id, key)): Path<(i64, String)>,
    State(state): State<AppState>,
    Json(body): Json<MetricConfigRequest>,
) -> Result<Json<StrategyMetricConfig>, AppError> {
    let strategy = state.require_strategy(id).await?;

    let mut calculator = state
        .registry
        .instantiate(&key)
        .ok_or_else(|| AppError::BadRequest(format!("unknown metric key: {}", key)))?;

    let custom_config = match body.custom_config {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    calculator
        .set_config(&custom_config)
        .map_err(|e| match e {
            MetricError::InvalidConfig(msg) => AppError::BadRequest(msg),
            other => AppError::Internal(other.to_string()),
        })?;

    let row = state
        .repo
        .upsert_metric_config(strategy.id, &key, body.is_enabled, &custom_config, body.order)
        .await?;
    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    pub at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub queued: bool,
}

/// Compute and store the strategy's metrics at `at` (default: now).
pub async fn snapshot_strategy_metrics(
    Path(id): Path<i64>,
    Query(params): Query<SnapshotQuery>,
    State(state): State<AppState>,
) -> Result<Json<SnapshotResponse>, AppError> {
    let strategy = state.require_strategy(id).await?;
    let at = params.at.unwrap_or_else(Utc::now);
    let mode = if params.queued {
        DispatchMode::Queued
    } else {
        DispatchMode::Sync
    };

    let outcome = state.trigger.request_snapshot(strategy.id, at, mode).await?;
    Ok(Json(SnapshotResponse::from_outcome(strategy.id, at, outcome)))
}

#[derive(Debug, Deserialize)]
pub struct StoredMetricsQuery {
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMetricsResponse {
    pub strategy_id: StrategyId,
    pub snapshot_at: Option<DateTime<Utc>>,
    pub metrics: Vec<StrategyMetricResult>,
}

/// Stored results at exactly `at`, or the most recent stored set.
pub async fn get_strategy_metrics(
    Path(id): Path<i64>,
    Query(params): Query<StoredMetricsQuery>,
    State(state): State<AppState>,
) -> Result<Json<StoredMetricsResponse>, AppError> {
    let strategy = state.require_strategy(id).await?;

    let metrics = match params.at {
        Some(at) => state.repo.query_metric_results_at(strategy.id, at).await?,
        None => state.repo.query_latest_metric_results(strategy.id).await?,
    };
    let snapshot_at = metrics.first().map(|m| m.snapshot_at);

    Ok(Json(StoredMetricsResponse {
        strategy_id: strategy.id,
        snapshot_at,
        metrics,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RecalculateQuery {
    pub at: Option<DateTime<Utc>>,
}

pub async fn recalculate_all(
    Query(params): Query<RecalculateQuery>,
    State(state): State<AppState>,
) -> Result<Json<RecalculationReport>, AppError> {
    let at = params.at.unwrap_or_else(Utc::now);
    let report = state.trigger.recalculate_all(at).await?;
    Ok(Json(report))
}
