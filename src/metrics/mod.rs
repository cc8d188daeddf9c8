//! Metrics engine: point-in-time financial indicators over a strategy's history.
//!
//! - [`MetricCalculator`]: the capability every metric implements
//! - [`calculators`]: the built-in APR, total, TVL, PNL and ROI formulas
//! - [`MetricsRegistry`]: key -> calculator directory
//!
//! Calculators are pure with respect to the strategy: they only read history
//! through [`crate::history::HistoryStore`].

pub mod calculator;
pub mod calculators;
pub mod config;
pub mod inception;
pub mod registry;
pub mod result;

pub use calculator::{MetricCalculator, MetricError, WindowKind};
pub use calculators::NO_SNAPSHOT_REASON;
pub use registry::{MetricInfo, MetricsRegistry};
pub use result::MetricResult;
