use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::metrics::SnapshotResponse;
use crate::api::AppState;
use crate::domain::{
    Decimal, NewSnapshot, NewTransaction, Snapshot, Strategy, StrategyId, StrategyStatus,
    StrategyType, Transaction,
};
use crate::error::AppError;
use crate::orchestration::{SnapshotOutcome, TriggerError};
use tracing::error;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStrategyRequest {
    pub name: String,
    pub strategy_type: StrategyType,
    #[serde(default)]
    pub status: StrategyStatus,
    pub created_at: Option<DateTime<Utc>>,
}

pub async fn create_strategy(
    State(state): State<AppState>,
    Json(body): Json<CreateStrategyRequest>,
) -> Result<(StatusCode, Json<Strategy>), AppError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }

    let strategy = state
        .repo
        .insert_strategy(
            name,
            body.strategy_type,
            body.status,
            body.created_at.unwrap_or_else(Utc::now),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(strategy)))
}

pub async fn get_strategy(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Strategy>, AppError> {
    Ok(Json(state.require_strategy(id).await?))
}

/// A recorded history item plus the metric snapshot it triggered, if any.
///
/// The record is already stored when the trigger runs, so a trigger failure
/// is reported in `metrics_snapshot` instead of failing the request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedResponse<T> {
    pub record: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_snapshot: Option<SnapshotResponse>,
}

fn triggered_snapshot(
    strategy_id: StrategyId,
    at: DateTime<Utc>,
    outcome: Result<Option<SnapshotOutcome>, TriggerError>,
) -> Option<SnapshotResponse> {
    match outcome {
        Ok(outcome) => outcome.map(|o| SnapshotResponse::from_outcome(strategy_id, at, o)),
        Err(e) => {
            error!(
                strategy_id = %strategy_id,
                at = %at,
                error = %e,
                "Triggered metric snapshot failed after record was stored"
            );
            Some(SnapshotResponse::failed(strategy_id, at, e.to_string()))
        }
    }
}

fn ensure_non_negative(field: &str, value: Decimal) -> Result<(), AppError> {
    if value < Decimal::zero() {
        return Err(AppError::BadRequest(format!("{} must not be negative", field)));
    }
    Ok(())
}

pub async fn record_transaction(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<NewTransaction>,
) -> Result<(StatusCode, Json<RecordedResponse<Transaction>>), AppError> {
    let strategy = state.require_strategy(id).await?;
    ensure_non_negative("totalValue", body.total_value)?;

    let transaction = state.repo.insert_transaction(strategy.id, &body).await?;
    let metrics_snapshot = triggered_snapshot(
        strategy.id,
        transaction.transaction_date,
        state.trigger.on_transaction_recorded(&transaction).await,
    );

    Ok((
        StatusCode::CREATED,
        Json(RecordedResponse {
            record: transaction,
            metrics_snapshot,
        }),
    ))
}

pub async fn record_snapshot(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<NewSnapshot>,
) -> Result<(StatusCode, Json<RecordedResponse<Snapshot>>), AppError> {
    let strategy = state.require_strategy(id).await?;
    ensure_non_negative("totalLiquidity", body.total_liquidity)?;
    ensure_non_negative("feesUncollected", body.fees_uncollected)?;

    let snapshot = state.repo.insert_snapshot(strategy.id, &body).await?;
    let metrics_snapshot = triggered_snapshot(
        strategy.id,
        snapshot.snapshot_at,
        state.trigger.on_snapshot_recorded(&snapshot).await,
    );

    Ok((
        StatusCode::CREATED,
        Json(RecordedResponse {
            record: snapshot,
            metrics_snapshot,
        }),
    ))
}
