//! Runtime configuration of a cluster member.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading a [`ClusterConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings shared by every node actor of a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// How long an ask waits for its reply, in milliseconds.
    pub ask_timeout_ms: u64,

    /// Idle period after which a write transaction actor cancels itself, in seconds.
    /// `0` disables the idle timer.
    pub write_transaction_idle_timeout_secs: u64,

    /// Capacity of each node actor's mailbox.
    pub mailbox_capacity: usize,

    /// Pause between schema resolution attempts after an ask-timeout, in milliseconds.
    pub schema_retry_delay_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            ask_timeout_ms: 5_000,
            write_transaction_idle_timeout_secs: 0,
            mailbox_capacity: 32,
            schema_retry_delay_ms: 0,
        }
    }
}

impl ClusterConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(document)?)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            ask_timeout_ms: parse_var(&lookup, "MOUNT_ASK_TIMEOUT_MS", defaults.ask_timeout_ms)?,
            write_transaction_idle_timeout_secs: parse_var(
                &lookup,
                "MOUNT_WRITE_TX_IDLE_TIMEOUT_SECS",
                defaults.write_transaction_idle_timeout_secs,
            )?,
            mailbox_capacity: parse_var(&lookup, "MOUNT_MAILBOX_CAPACITY", defaults.mailbox_capacity)?,
            schema_retry_delay_ms: parse_var(
                &lookup,
                "MOUNT_SCHEMA_RETRY_DELAY_MS",
                defaults.schema_retry_delay_ms,
            )?,
        })
    }

    pub fn ask_timeout(&self) -> Duration {
        Duration::from_millis(self.ask_timeout_ms)
    }

    pub fn write_transaction_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.write_transaction_idle_timeout_secs)
    }

    pub fn schema_retry_delay(&self) -> Duration {
        Duration::from_millis(self.schema_retry_delay_ms)
    }

    pub fn mailbox_capacity(&self) -> usize {
        self.mailbox_capacity.max(1)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_disable_idle_timeout() {
        let config = ClusterConfig::default();
        assert_eq!(config.ask_timeout(), Duration::from_secs(5));
        assert!(config.write_transaction_idle_timeout().is_zero());
        assert_eq!(config.mailbox_capacity(), 32);
    }

    #[test]
    fn test_from_lookup_overrides_and_rejects_garbage() {
        let vars: HashMap<&str, &str> = [
            ("MOUNT_ASK_TIMEOUT_MS", "250"),
            ("MOUNT_WRITE_TX_IDLE_TIMEOUT_SECS", " 30 "),
        ]
        .into_iter()
        .collect();
        let config = ClusterConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.ask_timeout(), Duration::from_millis(250));
        assert_eq!(config.write_transaction_idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.schema_retry_delay_ms, 0);

        let err = ClusterConfig::from_lookup(|k| {
            (k == "MOUNT_MAILBOX_CAPACITY").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "MOUNT_MAILBOX_CAPACITY", .. }));
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config = ClusterConfig::from_json(r#"{ "write_transaction_idle_timeout_secs": 15 }"#)
            .unwrap();
        assert_eq!(config.write_transaction_idle_timeout_secs, 15);
        assert_eq!(config.ask_timeout_ms, 5_000);
        assert!(ClusterConfig::from_json("{ not json").is_err());
    }
}
