pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod history;
pub mod metrics;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{Decimal, Snapshot, Strategy, StrategyId, Transaction, TransactionType};
pub use error::AppError;
pub use history::{HistoryStore, MemoryHistory};
pub use metrics::{MetricCalculator, MetricResult, MetricsRegistry};
pub use orchestration::{MetricsTrigger, StrategyMetricsService};
