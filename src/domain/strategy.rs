//! Strategy: one tracked DeFi investment position.

use super::StrategyId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyType {
    Staking,
    Lending,
    Borrowing,
    Farming,
}

impl StrategyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::Staking => "staking",
            StrategyType::Lending => "lending",
            StrategyType::Borrowing => "borrowing",
            StrategyType::Farming => "farming",
        }
    }
}

impl FromStr for StrategyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staking" => Ok(StrategyType::Staking),
            "lending" => Ok(StrategyType::Lending),
            "borrowing" => Ok(StrategyType::Borrowing),
            "farming" => Ok(StrategyType::Farming),
            other => Err(format!("unknown strategy type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    #[default]
    Active,
    Closed,
    Draft,
}

impl StrategyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyStatus::Active => "active",
            StrategyStatus::Closed => "closed",
            StrategyStatus::Draft => "draft",
        }
    }
}

impl FromStr for StrategyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(StrategyStatus::Active),
            "closed" => Ok(StrategyStatus::Closed),
            "draft" => Ok(StrategyStatus::Draft),
            other => Err(format!("unknown strategy status: {}", other)),
        }
    }
}

/// A tracked position. Read-only input to the metrics engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub id: StrategyId,
    pub name: String,
    pub strategy_type: StrategyType,
    pub status: StrategyStatus,
    pub created_at: DateTime<Utc>,
}

impl Strategy {
    pub fn new(
        id: StrategyId,
        name: impl Into<String>,
        strategy_type: StrategyType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            strategy_type,
            status: StrategyStatus::Active,
            created_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == StrategyStatus::Active
    }
}
