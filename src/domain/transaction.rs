//! Ledger events recorded against a strategy.

use super::{Decimal, StrategyId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    CollectFees,
    BorrowPrincipal,
    RepayPrincipal,
    LoanInterestAccrued,
    LendingInterestAccrued,
}

impl TransactionType {
    pub const ALL: [TransactionType; 7] = [
        TransactionType::Deposit,
        TransactionType::Withdraw,
        TransactionType::CollectFees,
        TransactionType::BorrowPrincipal,
        TransactionType::RepayPrincipal,
        TransactionType::LoanInterestAccrued,
        TransactionType::LendingInterestAccrued,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdraw => "withdraw",
            TransactionType::CollectFees => "collect_fees",
            TransactionType::BorrowPrincipal => "borrow_principal",
            TransactionType::RepayPrincipal => "repay_principal",
            TransactionType::LoanInterestAccrued => "loan_interest_accrued",
            TransactionType::LendingInterestAccrued => "lending_interest_accrued",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown transaction type: {}", s))
    }
}

/// One immutable ledger event.
///
/// `total_value` is the USD magnitude of the event; its direction is implied by
/// `transaction_type`, never by sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub strategy_id: StrategyId,
    pub transaction_type: TransactionType,
    pub total_value: Decimal,
    pub transaction_date: DateTime<Utc>,
}

/// Transaction fields supplied by a writer; the id is assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub transaction_type: TransactionType,
    pub total_value: Decimal,
    pub transaction_date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_parse_roundtrip() {
        for t in TransactionType::ALL {
            assert_eq!(t.as_str().parse::<TransactionType>().unwrap(), t);
        }
        assert!("collect fees".parse::<TransactionType>().is_err());
    }

    #[test]
    fn test_new_transaction_parses_camel_case() {
        let parsed: NewTransaction = serde_json::from_value(serde_json::json!({
            "transactionType": "collect_fees",
            "totalValue": 25,
            "transactionDate": "2025-01-10T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(parsed.transaction_type, TransactionType::CollectFees);
        assert_eq!(parsed.total_value, Decimal::from_i64(25));
    }

    #[test]
    fn test_transaction_type_serde_matches_as_str() {
        for t in TransactionType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
    }
}
