//! Domain types for strategy tracking.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Primitives: StrategyId and timestamp helpers
//! - Strategy, Transaction and Snapshot records (read-only inputs to metrics)
//! - Metric configuration rows and persisted metric results

pub mod decimal;
pub mod metric;
pub mod primitives;
pub mod snapshot;
pub mod strategy;
pub mod transaction;

pub use decimal::Decimal;
pub use metric::{StrategyMetricConfig, StrategyMetricResult};
pub use primitives::{from_ms, to_iso8601, to_ms, StrategyId};
pub use snapshot::{NewSnapshot, Snapshot};
pub use strategy::{Strategy, StrategyStatus, StrategyType};
pub use transaction::{NewTransaction, Transaction, TransactionType};
