//! Metric configuration and metric result operations for the repository.

use crate::domain::{from_ms, to_ms, StrategyId, StrategyMetricConfig, StrategyMetricResult};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{error, warn};

use super::{parse_decimal_column, Repository};

impl Repository {
    /// Create or update the config row for `(strategy_id, metric_key)`.
    ///
    /// The statement is stepped to completion with `fetch_all`; stopping after
    /// the first `RETURNING` row leaves the write open and invisible to other
    /// pool connections.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_metric_config(
        &self,
        strategy_id: StrategyId,
        metric_key: &str,
        is_enabled: bool,
        custom_config: &serde_json::Value,
        order: Option<i64>,
    ) -> Result<StrategyMetricConfig, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            INSERT INTO strategy_metric_configs (strategy_id, metric_key, is_enabled, custom_config, display_order)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(strategy_id, metric_key) DO UPDATE SET
                is_enabled = excluded.is_enabled,
                custom_config = excluded.custom_config,
                display_order = excluded.display_order
            RETURNING id, strategy_id, metric_key, is_enabled, custom_config, display_order
            "#,
        )
        .bind(strategy_id.as_i64())
        .bind(metric_key)
        .bind(is_enabled)
        .bind(custom_config.to_string())
        .bind(order)
        .fetch_all(&self.pool)
        .await?;

        let row = rows.first().ok_or(sqlx::Error::RowNotFound)?;
        config_from_row(row).map_err(|e| sqlx::Error::Decode(Box::new(e)))
    }

    /// Enabled config rows for a strategy, in display order (unordered rows last).
    ///
    /// A row whose `custom_config` is not valid JSON is logged and left out, so
    /// its metric is not computed with defaults it was never configured with.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_enabled_metric_configs(
        &self,
        strategy_id: StrategyId,
    ) -> Result<Vec<StrategyMetricConfig>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, strategy_id, metric_key, is_enabled, custom_config, display_order
            FROM strategy_metric_configs
            WHERE strategy_id = ? AND is_enabled = 1
            ORDER BY display_order IS NULL, display_order ASC, id ASC
            "#,
        )
        .bind(strategy_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| match config_from_row(row) {
                Ok(config) => Some(config),
                Err(e) => {
                    let metric_key: String = row.get("metric_key");
                    error!(
                        strategy_id = %strategy_id,
                        metric_key = %metric_key,
                        error = %e,
                        "Unparseable custom_config, skipping metric"
                    );
                    None
                }
            })
            .collect())
    }

    /// Replace every stored result for `(strategy_id, snapshot_at)` with `results`.
    ///
    /// Delete and insert run in one transaction, so readers see either the old
    /// set or the new one. Returns the number of rows written.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; nothing is changed in that case.
    pub async fn replace_metric_results(
        &self,
        strategy_id: StrategyId,
        snapshot_at: DateTime<Utc>,
        results: &[StrategyMetricResult],
    ) -> Result<usize, sqlx::Error> {
        let snapshot_at_ms = to_ms(snapshot_at);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM strategy_metric_results
            WHERE strategy_id = ? AND snapshot_at_ms = ?
            "#,
        )
        .bind(strategy_id.as_i64())
        .bind(snapshot_at_ms)
        .execute(&mut *tx)
        .await?;

        let mut written = 0usize;
        for result in results {
            // Upsert tolerates a duplicate key inside one batch; the last one wins.
            let outcome = sqlx::query(
                r#"
                INSERT INTO strategy_metric_results (strategy_id, metric_key, snapshot_at_ms, value, unit, meta)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(strategy_id, metric_key, snapshot_at_ms) DO UPDATE SET
                    value = excluded.value,
                    unit = excluded.unit,
                    meta = excluded.meta
                "#,
            )
            .bind(strategy_id.as_i64())
            .bind(result.metric_key.as_str())
            .bind(snapshot_at_ms)
            .bind(result.value.map(|d| d.to_canonical_string()))
            .bind(result.unit.as_str())
            .bind(result.meta.to_string())
            .execute(&mut *tx)
            .await?;

            if outcome.rows_affected() > 0 {
                written += 1;
            }
        }

        tx.commit().await?;
        Ok(written)
    }

    /// Stored results for a strategy at exactly `snapshot_at`, ordered by metric key.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_metric_results_at(
        &self,
        strategy_id: StrategyId,
        snapshot_at: DateTime<Utc>,
    ) -> Result<Vec<StrategyMetricResult>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, strategy_id, metric_key, snapshot_at_ms, value, unit, meta
            FROM strategy_metric_results
            WHERE strategy_id = ? AND snapshot_at_ms = ?
            ORDER BY metric_key ASC
            "#,
        )
        .bind(strategy_id.as_i64())
        .bind(to_ms(snapshot_at))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(result_from_row).collect())
    }

    /// The most recent stored result set for a strategy.
    ///
    /// Returns an empty vec if nothing has been snapshotted yet.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_latest_metric_results(
        &self,
        strategy_id: StrategyId,
    ) -> Result<Vec<StrategyMetricResult>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT MAX(snapshot_at_ms) AS max_time
            FROM strategy_metric_results
            WHERE strategy_id = ?
            "#,
        )
        .bind(strategy_id.as_i64())
        .fetch_one(&self.pool)
        .await?;

        match row.get::<Option<i64>, _>("max_time") {
            Some(ms) => self.query_metric_results_at(strategy_id, from_ms(ms)).await,
            None => Ok(Vec::new()),
        }
    }
}

fn config_from_row(row: &SqliteRow) -> Result<StrategyMetricConfig, serde_json::Error> {
    let raw: String = row.get("custom_config");
    let custom_config = serde_json::from_str(&raw)?;

    Ok(StrategyMetricConfig {
        id: row.get("id"),
        strategy_id: StrategyId::new(row.get("strategy_id")),
        metric_key: row.get("metric_key"),
        is_enabled: row.get("is_enabled"),
        custom_config,
        order: row.get("display_order"),
    })
}

fn result_from_row(row: &SqliteRow) -> StrategyMetricResult {
    let id: i64 = row.get("id");
    let value: Option<String> = row.get("value");
    let raw_meta: String = row.get("meta");
    let meta = serde_json::from_str(&raw_meta).unwrap_or_else(|e| {
        warn!(row_id = id, error = %e, "Failed to parse metric meta JSON, using empty object");
        serde_json::Value::Object(Default::default())
    });

    StrategyMetricResult {
        strategy_id: StrategyId::new(row.get("strategy_id")),
        metric_key: row.get("metric_key"),
        snapshot_at: from_ms(row.get("snapshot_at_ms")),
        value: value.map(|v| parse_decimal_column("value", &v, id)),
        unit: row.get("unit"),
        meta,
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::setup_test_db;
    use super::*;
    use crate::domain::{Decimal, StrategyStatus, StrategyType};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    async fn seeded() -> (Repository, StrategyId, tempfile::TempDir) {
        let (repo, temp) = setup_test_db().await;
        let strategy = repo
            .insert_strategy("lp", StrategyType::Farming, StrategyStatus::Active, t0())
            .await
            .unwrap();
        (repo, strategy.id, temp)
    }

    fn row(id: StrategyId, key: &str, value: Option<i64>, at: DateTime<Utc>) -> StrategyMetricResult {
        StrategyMetricResult {
            strategy_id: id,
            metric_key: key.to_string(),
            snapshot_at: at,
            value: value.map(Decimal::from_i64),
            unit: "USD".to_string(),
            meta: json!({"window": "point"}),
        }
    }

    #[tokio::test]
    async fn test_upsert_metric_config_updates_in_place() {
        let (repo, id, _temp) = seeded().await;

        let first = repo
            .upsert_metric_config(id, "tvl", true, &json!({}), Some(2))
            .await
            .unwrap();
        let second = repo
            .upsert_metric_config(id, "tvl", true, &json!({"round": 2}), Some(1))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.custom_config, json!({"round": 2}));
        assert_eq!(second.order, Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_saved_config_is_visible_to_next_read() {
        let (repo, id, _temp) = seeded().await;

        for round in 0..200i64 {
            let key = format!("metric_{}", round);
            repo.upsert_metric_config(id, &key, true, &json!({"round": 2}), Some(round))
                .await
                .unwrap();

            let listed = repo.list_enabled_metric_configs(id).await.unwrap();
            assert_eq!(listed.len() as i64, round + 1, "round {}", round);
            assert_eq!(listed.last().unwrap().metric_key, key);
        }
    }

    #[tokio::test]
    async fn test_unparseable_custom_config_row_is_skipped() {
        let (repo, id, _temp) = seeded().await;
        repo.upsert_metric_config(id, "tvl", true, &json!({}), Some(1))
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO strategy_metric_configs (strategy_id, metric_key, is_enabled, custom_config, display_order) VALUES (?, 'pnl', 1, '{not json', 2)",
        )
        .bind(id.as_i64())
        .execute(&repo.pool)
        .await
        .unwrap();

        let keys: Vec<String> = repo
            .list_enabled_metric_configs(id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.metric_key)
            .collect();
        assert_eq!(keys, vec!["tvl"]);
    }

    #[tokio::test]
    async fn test_enabled_configs_ordered_with_nulls_last() {
        let (repo, id, _temp) = seeded().await;

        repo.upsert_metric_config(id, "roi", true, &json!({}), None)
            .await
            .unwrap();
        repo.upsert_metric_config(id, "pnl", true, &json!({}), Some(2))
            .await
            .unwrap();
        repo.upsert_metric_config(id, "tvl", true, &json!({}), Some(1))
            .await
            .unwrap();
        repo.upsert_metric_config(id, "fees_collected", false, &json!({}), Some(0))
            .await
            .unwrap();

        let keys: Vec<String> = repo
            .list_enabled_metric_configs(id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.metric_key)
            .collect();
        assert_eq!(keys, vec!["tvl", "pnl", "roi"]);
    }

    #[tokio::test]
    async fn test_replace_metric_results_drops_stale_keys() {
        let (repo, id, _temp) = seeded().await;
        let at = t0() + Duration::days(30);

        repo.replace_metric_results(
            id,
            at,
            &[row(id, "tvl", Some(1000), at), row(id, "pnl", Some(50), at)],
        )
        .await
        .unwrap();
        let written = repo
            .replace_metric_results(id, at, &[row(id, "tvl", Some(1100), at)])
            .await
            .unwrap();
        assert_eq!(written, 1);

        let stored = repo.query_metric_results_at(id, at).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].metric_key, "tvl");
        assert_eq!(stored[0].value, Some(Decimal::from_i64(1100)));
        assert_eq!(stored[0].meta, json!({"window": "point"}));
    }

    #[tokio::test]
    async fn test_replace_leaves_other_timestamps_untouched() {
        let (repo, id, _temp) = seeded().await;
        let earlier = t0() + Duration::days(1);
        let later = t0() + Duration::days(2);

        repo.replace_metric_results(id, earlier, &[row(id, "tvl", Some(1), earlier)])
            .await
            .unwrap();
        repo.replace_metric_results(id, later, &[row(id, "tvl", None, later)])
            .await
            .unwrap();
        repo.replace_metric_results(id, later, &[]).await.unwrap();

        assert_eq!(repo.query_metric_results_at(id, earlier).await.unwrap().len(), 1);
        assert!(repo.query_metric_results_at(id, later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_latest_metric_results() {
        let (repo, id, _temp) = seeded().await;
        assert!(repo.query_latest_metric_results(id).await.unwrap().is_empty());

        let earlier = t0() + Duration::days(1);
        let later = t0() + Duration::days(2);
        repo.replace_metric_results(id, later, &[row(id, "roi", None, later)])
            .await
            .unwrap();
        repo.replace_metric_results(id, earlier, &[row(id, "tvl", Some(1), earlier)])
            .await
            .unwrap();

        let latest = repo.query_latest_metric_results(id).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].metric_key, "roi");
        assert_eq!(latest[0].value, None);
        assert_eq!(latest[0].snapshot_at, later);
    }
}
