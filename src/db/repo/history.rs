//! Transaction and snapshot operations for the repository.

use crate::domain::{
    from_ms, to_ms, Decimal, NewSnapshot, NewTransaction, Snapshot, StrategyId, Transaction,
    TransactionType,
};
use crate::history::{HistoryError, HistoryStore, TimeWindow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{parse_decimal_column, Repository};

impl Repository {
    /// Append a transaction to a strategy's ledger.
    ///
    /// # Errors
    /// Returns an error if the insert fails (including an unknown strategy id).
    pub async fn insert_transaction(
        &self,
        strategy_id: StrategyId,
        input: &NewTransaction,
    ) -> Result<Transaction, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (strategy_id, transaction_type, total_value, transaction_date_ms)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(strategy_id.as_i64())
        .bind(input.transaction_type.as_str())
        .bind(input.total_value.to_canonical_string())
        .bind(to_ms(input.transaction_date))
        .execute(&self.pool)
        .await?;

        Ok(Transaction {
            id: result.last_insert_rowid(),
            strategy_id,
            transaction_type: input.transaction_type,
            total_value: input.total_value,
            transaction_date: from_ms(to_ms(input.transaction_date)),
        })
    }

    /// Append a snapshot for a strategy.
    ///
    /// # Errors
    /// Returns an error if the insert fails (including an unknown strategy id).
    pub async fn insert_snapshot(
        &self,
        strategy_id: StrategyId,
        input: &NewSnapshot,
    ) -> Result<Snapshot, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO snapshots (
                strategy_id, snapshot_at_ms, total_liquidity, fees_uncollected,
                current_loan_balance, accrued_loan_interest, overall_health_factor
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(strategy_id.as_i64())
        .bind(to_ms(input.snapshot_at))
        .bind(input.total_liquidity.to_canonical_string())
        .bind(input.fees_uncollected.to_canonical_string())
        .bind(input.current_loan_balance.map(|d| d.to_canonical_string()))
        .bind(input.accrued_loan_interest.map(|d| d.to_canonical_string()))
        .bind(input.overall_health_factor.map(|d| d.to_canonical_string()))
        .execute(&self.pool)
        .await?;

        let mut stored = input.clone();
        stored.snapshot_at = from_ms(to_ms(input.snapshot_at));
        Ok(stored.into_snapshot(result.last_insert_rowid(), strategy_id))
    }
}

fn snapshot_from_row(row: &SqliteRow) -> Snapshot {
    let id: i64 = row.get("id");
    let required = |column: &str| -> Decimal {
        let raw: String = row.get(column);
        parse_decimal_column(column, &raw, id)
    };
    let optional = |column: &str| -> Option<Decimal> {
        let raw: Option<String> = row.get(column);
        raw.map(|s| parse_decimal_column(column, &s, id))
    };

    Snapshot {
        id,
        strategy_id: StrategyId::new(row.get("strategy_id")),
        snapshot_at: from_ms(row.get("snapshot_at_ms")),
        total_liquidity: required("total_liquidity"),
        fees_uncollected: required("fees_uncollected"),
        current_loan_balance: optional("current_loan_balance"),
        accrued_loan_interest: optional("accrued_loan_interest"),
        overall_health_factor: optional("overall_health_factor"),
    }
}

#[async_trait]
impl HistoryStore for Repository {
    async fn sum_transactions(
        &self,
        strategy_id: StrategyId,
        transaction_type: TransactionType,
        window: TimeWindow,
    ) -> Result<Decimal, HistoryError> {
        let from_ms = window.from.map(to_ms).unwrap_or(i64::MIN);

        // Summed in Rust: SQLite SUM over TEXT would coerce to REAL.
        let rows = sqlx::query(
            r#"
            SELECT id, total_value
            FROM transactions
            WHERE strategy_id = ? AND transaction_type = ?
              AND transaction_date_ms >= ? AND transaction_date_ms <= ?
            "#,
        )
        .bind(strategy_id.as_i64())
        .bind(transaction_type.as_str())
        .bind(from_ms)
        .bind(to_ms(window.to))
        .fetch_all(&self.pool)
        .await?;

        Decimal::checked_sum(rows.iter().map(|row| {
            let raw: String = row.get("total_value");
            parse_decimal_column("total_value", &raw, row.get("id"))
        }))
        .ok_or(HistoryError::SumOverflow(transaction_type))
    }

    async fn latest_snapshot_at_or_before(
        &self,
        strategy_id: StrategyId,
        at: DateTime<Utc>,
    ) -> Result<Option<Snapshot>, HistoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, strategy_id, snapshot_at_ms, total_liquidity, fees_uncollected,
                   current_loan_balance, accrued_loan_interest, overall_health_factor
            FROM snapshots
            WHERE strategy_id = ? AND snapshot_at_ms <= ?
            ORDER BY snapshot_at_ms DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(strategy_id.as_i64())
        .bind(to_ms(at))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(snapshot_from_row))
    }

    async fn earliest_snapshot_at(
        &self,
        strategy_id: StrategyId,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, HistoryError> {
        let row = sqlx::query(
            r#"
            SELECT MIN(snapshot_at_ms) AS min_time
            FROM snapshots
            WHERE strategy_id = ? AND snapshot_at_ms <= ?
            "#,
        )
        .bind(strategy_id.as_i64())
        .bind(to_ms(at))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<Option<i64>, _>("min_time").map(from_ms))
    }

    async fn earliest_transaction_at(
        &self,
        strategy_id: StrategyId,
        at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, HistoryError> {
        let row = sqlx::query(
            r#"
            SELECT MIN(transaction_date_ms) AS min_time
            FROM transactions
            WHERE strategy_id = ? AND transaction_date_ms <= ?
            "#,
        )
        .bind(strategy_id.as_i64())
        .bind(to_ms(at))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<Option<i64>, _>("min_time").map(from_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::setup_test_db;
    use super::*;
    use crate::domain::{StrategyStatus, StrategyType};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn tx(transaction_type: TransactionType, value: Decimal, days: i64) -> NewTransaction {
        NewTransaction {
            transaction_type,
            total_value: value,
            transaction_date: t0() + Duration::days(days),
        }
    }

    async fn seeded() -> (Repository, StrategyId, tempfile::TempDir) {
        let (repo, temp) = setup_test_db().await;
        let strategy = repo
            .insert_strategy("lp", StrategyType::Farming, StrategyStatus::Active, t0())
            .await
            .unwrap();
        (repo, strategy.id, temp)
    }

    #[tokio::test]
    async fn test_sum_transactions_is_exact_and_windowed() {
        let (repo, id, _temp) = seeded().await;

        for (value, day) in [(dec!(0.1), 1), (dec!(0.2), 2), (dec!(100), 40)] {
            repo.insert_transaction(id, &tx(TransactionType::Deposit, Decimal::new(value), day))
                .await
                .unwrap();
        }
        repo.insert_transaction(id, &tx(TransactionType::Withdraw, Decimal::from_i64(5), 2))
            .await
            .unwrap();

        let window = TimeWindow::up_to(t0() + Duration::days(30));
        let deposits = repo
            .sum_transactions(id, TransactionType::Deposit, window)
            .await
            .unwrap();
        assert_eq!(deposits, Decimal::new(dec!(0.3)));

        let between = TimeWindow::between(t0() + Duration::days(2), t0() + Duration::days(40));
        let deposits = repo
            .sum_transactions(id, TransactionType::Deposit, between)
            .await
            .unwrap();
        assert_eq!(deposits, Decimal::new(dec!(100.2)));

        let none = repo
            .sum_transactions(id, TransactionType::CollectFees, window)
            .await
            .unwrap();
        assert!(none.is_zero());
    }

    #[tokio::test]
    async fn test_latest_snapshot_prefers_latest_time_then_highest_id() {
        let (repo, id, _temp) = seeded().await;
        let at = t0() + Duration::days(10);

        repo.insert_snapshot(id, &NewSnapshot::new(at, Decimal::from_i64(1), Decimal::zero()))
            .await
            .unwrap();
        let second = repo
            .insert_snapshot(id, &NewSnapshot::new(at, Decimal::from_i64(2), Decimal::zero()))
            .await
            .unwrap();
        repo.insert_snapshot(
            id,
            &NewSnapshot::new(at + Duration::days(1), Decimal::from_i64(3), Decimal::zero()),
        )
        .await
        .unwrap();

        let latest = repo
            .latest_snapshot_at_or_before(id, at)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest, second);

        assert!(repo
            .latest_snapshot_at_or_before(id, t0())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_earliest_queries_respect_upper_bound() {
        let (repo, id, _temp) = seeded().await;

        repo.insert_snapshot(
            id,
            &NewSnapshot::new(t0() + Duration::days(5), Decimal::from_i64(1), Decimal::zero()),
        )
        .await
        .unwrap();
        repo.insert_transaction(id, &tx(TransactionType::Deposit, Decimal::from_i64(1), 3))
            .await
            .unwrap();

        let at = t0() + Duration::days(4);
        assert_eq!(repo.earliest_snapshot_at(id, at).await.unwrap(), None);
        assert_eq!(
            repo.earliest_transaction_at(id, at).await.unwrap(),
            Some(t0() + Duration::days(3))
        );
        assert_eq!(
            repo.earliest_snapshot_at(id, at + Duration::days(1)).await.unwrap(),
            Some(t0() + Duration::days(5))
        );
    }

    #[tokio::test]
    async fn test_snapshot_optional_columns_roundtrip() {
        let (repo, id, _temp) = seeded().await;
        let mut input = NewSnapshot::new(t0(), Decimal::from_i64(500), Decimal::new(dec!(1.25)));
        input.current_loan_balance = Some(Decimal::from_i64(200));
        input.overall_health_factor = Some(Decimal::new(dec!(1.8)));

        let stored = repo.insert_snapshot(id, &input).await.unwrap();
        let loaded = repo
            .latest_snapshot_at_or_before(id, t0())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, stored);
        assert_eq!(loaded.accrued_loan_interest, None);
    }

    #[tokio::test]
    async fn test_insert_for_unknown_strategy_fails() {
        let (repo, _id, _temp) = seeded().await;
        let result = repo
            .insert_transaction(
                StrategyId::new(404),
                &tx(TransactionType::Deposit, Decimal::from_i64(1), 0),
            )
            .await;
        assert!(result.is_err());
    }
}
