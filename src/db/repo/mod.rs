//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `history.rs` - Transaction and snapshot operations, plus the `HistoryStore` impl
//! - `metrics.rs` - Metric configuration and metric result operations

mod history;
mod metrics;

use crate::domain::{from_ms, to_ms, Decimal, Strategy, StrategyId, StrategyStatus, StrategyType};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Round-trips a trivial query; backs `/ready`.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // Strategy operations
    // =========================================================================

    /// Insert a strategy and return it with its assigned id.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_strategy(
        &self,
        name: &str,
        strategy_type: StrategyType,
        status: StrategyStatus,
        created_at: DateTime<Utc>,
    ) -> Result<Strategy, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO strategies (name, strategy_type, status, created_at_ms)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(strategy_type.as_str())
        .bind(status.as_str())
        .bind(to_ms(created_at))
        .execute(&self.pool)
        .await?;

        Ok(Strategy {
            id: StrategyId::new(result.last_insert_rowid()),
            name: name.to_string(),
            strategy_type,
            status,
            // Stored at millisecond precision
            created_at: from_ms(to_ms(created_at)),
        })
    }

    /// Fetch a strategy by id.
    ///
    /// Returns None if no such strategy exists.
    pub async fn get_strategy(&self, id: StrategyId) -> Result<Option<Strategy>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, name, strategy_type, status, created_at_ms
            FROM strategies
            WHERE id = ?
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(strategy_from_row))
    }

    /// All strategies with status `active`, ordered by id.
    pub async fn list_active_strategies(&self) -> Result<Vec<Strategy>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, strategy_type, status, created_at_ms
            FROM strategies
            WHERE status = ?
            ORDER BY id ASC
            "#,
        )
        .bind(StrategyStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(strategy_from_row).collect())
    }
}

fn strategy_from_row(row: &SqliteRow) -> Strategy {
    let id: i64 = row.get("id");
    let type_str: String = row.get("strategy_type");
    let status_str: String = row.get("status");

    let strategy_type = StrategyType::from_str(&type_str).unwrap_or_else(|e| {
        warn!(strategy_id = id, error = %e, "Unknown strategy type in database, using farming");
        StrategyType::Farming
    });
    let status = StrategyStatus::from_str(&status_str).unwrap_or_else(|e| {
        warn!(strategy_id = id, error = %e, "Unknown strategy status in database, using draft");
        StrategyStatus::Draft
    });

    Strategy {
        id: StrategyId::new(id),
        name: row.get("name"),
        strategy_type,
        status,
        created_at: from_ms(row.get("created_at_ms")),
    }
}

/// Parse a stored decimal column, falling back to zero with a warning.
fn parse_decimal_column(column: &str, raw: &str, row_id: i64) -> Decimal {
    Decimal::from_str(raw).unwrap_or_else(|e| {
        warn!(
            row_id,
            column,
            value = %raw,
            error = %e,
            "Failed to parse decimal column, using default"
        );
        Decimal::default()
    })
}
