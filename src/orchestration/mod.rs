//! Per-strategy metric orchestration: computing, persisting and triggering snapshots.

pub mod metrics_service;
pub mod trigger;

pub use metrics_service::{ServiceError, StrategyMetricsService};
pub use trigger::{
    DispatchMode, MetricsTrigger, RecalculationReport, SnapshotJob, SnapshotOutcome,
    SnapshotWorker, TriggerError,
};
