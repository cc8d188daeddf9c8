use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub triggers: MetricsTriggerConfig,
}

/// When recording history should recalculate metrics, and whether the caller waits.
///
/// Every flag defaults to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsTriggerConfig {
    pub trigger_on_transaction: bool,
    pub sync_on_transaction: bool,
    pub trigger_on_snapshot: bool,
    pub sync_on_snapshot: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let triggers = MetricsTriggerConfig {
            trigger_on_transaction: parse_flag(&env_map, "METRICS_TRIGGER_ON_TRANSACTION")?,
            sync_on_transaction: parse_flag(&env_map, "METRICS_SYNC_ON_TRANSACTION")?,
            trigger_on_snapshot: parse_flag(&env_map, "METRICS_TRIGGER_ON_SNAPSHOT")?,
            sync_on_snapshot: parse_flag(&env_map, "METRICS_SYNC_ON_SNAPSHOT")?,
        };

        Ok(Config {
            port,
            database_path,
            triggers,
        })
    }
}

fn parse_flag(env_map: &HashMap<String, String>, name: &str) -> Result<bool, ConfigError> {
    match env_map.get(name).map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(value) => match value.as_str() {
            "" | "0" | "false" | "no" | "off" => Ok(false),
            "1" | "true" | "yes" | "on" => Ok(true),
            other => Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("must be a boolean, got {}", other),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, "/tmp/test.db");
        assert_eq!(config.triggers, MetricsTriggerConfig::default());
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_trigger_flags_parsed() {
        let mut env_map = setup_required_env();
        env_map.insert("METRICS_TRIGGER_ON_TRANSACTION".to_string(), "true".to_string());
        env_map.insert("METRICS_SYNC_ON_TRANSACTION".to_string(), "1".to_string());
        env_map.insert("METRICS_TRIGGER_ON_SNAPSHOT".to_string(), "Yes".to_string());
        env_map.insert("METRICS_SYNC_ON_SNAPSHOT".to_string(), "off".to_string());

        let config = Config::from_env_map(env_map).unwrap();
        assert!(config.triggers.trigger_on_transaction);
        assert!(config.triggers.sync_on_transaction);
        assert!(config.triggers.trigger_on_snapshot);
        assert!(!config.triggers.sync_on_snapshot);
    }

    #[test]
    fn test_invalid_trigger_flag() {
        let mut env_map = setup_required_env();
        env_map.insert("METRICS_SYNC_ON_SNAPSHOT".to_string(), "sometimes".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "METRICS_SYNC_ON_SNAPSHOT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
