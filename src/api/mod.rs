pub mod health;
pub mod metrics;
pub mod strategies;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{Strategy, StrategyId};
use crate::error::AppError;
use crate::metrics::MetricsRegistry;
use crate::orchestration::{MetricsTrigger, SnapshotWorker, StrategyMetricsService};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub registry: Arc<MetricsRegistry>,
    pub service: Arc<StrategyMetricsService>,
    pub trigger: MetricsTrigger,
}

impl AppState {
    /// Wire the service and trigger. The returned worker must be spawned for
    /// queued snapshot requests to run.
    pub fn new(
        repo: Arc<Repository>,
        config: Config,
        registry: Arc<MetricsRegistry>,
    ) -> (Self, SnapshotWorker) {
        let service = Arc::new(StrategyMetricsService::new(registry.clone(), repo.clone()));
        let (trigger, worker) = MetricsTrigger::new(service.clone(), repo.clone(), config.triggers);
        (
            Self {
                repo,
                config,
                registry,
                service,
                trigger,
            },
            worker,
        )
    }

    /// Load a strategy or fail with 404.
    pub(crate) async fn require_strategy(&self, id: i64) -> Result<Strategy, AppError> {
        self.repo
            .get_strategy(StrategyId::new(id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("strategy {} not found", id)))
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/strategies", post(strategies::create_strategy))
        .route("/v1/strategies/:id", get(strategies::get_strategy))
        .route(
            "/v1/strategies/:id/transactions",
            post(strategies::record_transaction),
        )
        .route(
            "/v1/strategies/:id/snapshots",
            post(strategies::record_snapshot),
        )
        .route(
            "/v1/strategies/:id/metrics",
            get(metrics::get_strategy_metrics),
        )
        .route(
            "/v1/strategies/:id/metrics/snapshot",
            post(metrics::snapshot_strategy_metrics),
        )
        .route(
            "/v1/strategies/:id/metrics/config/:key",
            put(metrics::put_metric_config),
        )
        .route("/v1/metrics", get(metrics::list_metrics))
        .route("/v1/metrics/recalculate", post(metrics::recalculate_all))
        .layer(cors)
        .with_state(state)
}
