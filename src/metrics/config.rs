//! Typed calculator options parsed from a strategy's `custom_config` document.
//!
//! Each patch type lists the keys one family of calculators accepts. Missing
//! keys leave the current value alone, `"round": null` clears rounding, and
//! keys outside the patch are dropped by serde.

use super::MetricError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

/// Parse `config` into a patch. Returns `None` for `null` or an empty object.
pub(crate) fn parse_patch<T: DeserializeOwned>(config: &Value) -> Result<Option<T>, MetricError> {
    match config {
        Value::Null => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        Value::Object(_) => serde_json::from_value(config.clone())
            .map(Some)
            .map_err(|e| MetricError::InvalidConfig(e.to_string())),
        other => Err(MetricError::InvalidConfig(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`).
fn explicit<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Display options shared by the transaction totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    pub unit: String,
    pub round: Option<u32>,
}

impl DisplayConfig {
    pub fn with_unit(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            round: None,
        }
    }

    pub fn apply(&mut self, patch: DisplayPatch) {
        if let Some(unit) = patch.unit {
            self.unit = unit;
        }
        if let Some(round) = patch.round {
            self.round = round;
        }
    }

    pub fn applied(&self) -> Value {
        json!({ "unit": self.unit, "round": self.round, "mode": "ltd" })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DisplayPatch {
    pub unit: Option<String>,
    #[serde(deserialize_with = "explicit")]
    pub round: Option<Option<u32>>,
}

/// Options for the farming APR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmingConfig {
    pub include_il: bool,
    pub display: DisplayConfig,
}

impl Default for FarmingConfig {
    fn default() -> Self {
        Self {
            include_il: true,
            display: DisplayConfig::with_unit("%"),
        }
    }
}

impl FarmingConfig {
    pub fn apply(&mut self, patch: FarmingPatch) {
        if let Some(include_il) = patch.include_il {
            self.include_il = include_il;
        }
        self.display.apply(DisplayPatch {
            unit: patch.unit,
            round: patch.round,
        });
    }

    pub fn applied(&self) -> Value {
        json!({
            "include_il": self.include_il,
            "unit": self.display.unit,
            "round": self.display.round,
            "mode": "ltd",
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FarmingPatch {
    pub include_il: Option<bool>,
    pub unit: Option<String>,
    #[serde(deserialize_with = "explicit")]
    pub round: Option<Option<u32>>,
}

/// Options for the lending APR. `include_pending` is carried and echoed but
/// does not change which transactions are counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LendingConfig {
    pub include_pending: bool,
    pub display: DisplayConfig,
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            include_pending: false,
            display: DisplayConfig::with_unit("%"),
        }
    }
}

impl LendingConfig {
    pub fn apply(&mut self, patch: LendingPatch) {
        if let Some(include_pending) = patch.include_pending {
            self.include_pending = include_pending;
        }
        self.display.apply(DisplayPatch {
            unit: patch.unit,
            round: patch.round,
        });
    }

    pub fn applied(&self) -> Value {
        json!({
            "include_pending": self.include_pending,
            "unit": self.display.unit,
            "round": self.display.round,
            "mode": "ltd",
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LendingPatch {
    pub include_pending: Option<bool>,
    pub unit: Option<String>,
    #[serde(deserialize_with = "explicit")]
    pub round: Option<Option<u32>>,
}

/// Rounding-only options for calculators with a fixed unit.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RoundPatch {
    #[serde(deserialize_with = "explicit")]
    pub round: Option<Option<u32>>,
}
