//! Ledger configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::Amount;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key} value: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Ledger configuration shared by the engine and the balance lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Balance of a user that was never written
    pub default_balance: Amount,
    pub user_table: String,
    pub idempotency_table: String,
    pub user_key_prefix: String,
    pub idempotency_key_prefix: String,
    /// Per-call limit applied by [`TimeoutStore`](crate::store::TimeoutStore)
    pub request_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_balance: Amount::from_units(100),
            user_table: "UserBalance".to_string(),
            idempotency_table: "IdempotencyKeys".to_string(),
            user_key_prefix: "USER#".to_string(),
            idempotency_key_prefix: "IDEMPOTENT#".to_string(),
            request_timeout: Duration::from_millis(5_000),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables, after reading a `.env`
    /// file if one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup; unset keys keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let default_balance = match lookup("LEDGER_DEFAULT_BALANCE") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "LEDGER_DEFAULT_BALANCE",
                value,
            })?,
            None => defaults.default_balance,
        };

        let request_timeout = match lookup("LEDGER_REQUEST_TIMEOUT_MS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .ok_or(ConfigError::InvalidValue {
                    key: "LEDGER_REQUEST_TIMEOUT_MS",
                    value,
                })?,
            None => defaults.request_timeout,
        };

        Ok(Self {
            default_balance,
            user_table: non_empty(&lookup, "LEDGER_USER_TABLE", defaults.user_table)?,
            idempotency_table: non_empty(
                &lookup,
                "LEDGER_IDEMPOTENCY_TABLE",
                defaults.idempotency_table,
            )?,
            user_key_prefix: lookup("LEDGER_USER_KEY_PREFIX").unwrap_or(defaults.user_key_prefix),
            idempotency_key_prefix: lookup("LEDGER_IDEMPOTENCY_KEY_PREFIX")
                .unwrap_or(defaults.idempotency_key_prefix),
            request_timeout,
        })
    }

    /// Primary key of a user's balance record.
    pub fn user_key(&self, user_id: &str) -> String {
        format!("{}{user_id}", self.user_key_prefix)
    }

    /// Primary key of an idempotency record.
    pub fn idempotency_key(&self, key: &str) -> String {
        format!("{}{key}", self.idempotency_key_prefix)
    }
}

fn non_empty(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: String,
) -> Result<String, ConfigError> {
    match lookup(key) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::InvalidValue { key, value }),
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.default_balance, Amount::from_units(100));
        assert_eq!(config.user_table, "UserBalance");
        assert_eq!(config.idempotency_table, "IdempotencyKeys");
        assert_eq!(config.user_key("42"), "USER#42");
        assert_eq!(config.idempotency_key("abc"), "IDEMPOTENT#abc");
    }

    #[test]
    fn empty_lookup_gives_defaults() {
        let config = LedgerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LedgerConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = LedgerConfig::from_lookup(lookup(&[
            ("LEDGER_DEFAULT_BALANCE", "250.5"),
            ("LEDGER_USER_TABLE", "Balances"),
            ("LEDGER_IDEMPOTENCY_KEY_PREFIX", "IDEM-"),
            ("LEDGER_REQUEST_TIMEOUT_MS", "750"),
        ]))
        .unwrap();

        assert_eq!(config.default_balance.to_string(), "250.5");
        assert_eq!(config.user_table, "Balances");
        assert_eq!(config.idempotency_table, "IdempotencyKeys");
        assert_eq!(config.idempotency_key("k"), "IDEM-k");
        assert_eq!(config.request_timeout, Duration::from_millis(750));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (key, value) in [
            ("LEDGER_DEFAULT_BALANCE", "lots"),
            ("LEDGER_REQUEST_TIMEOUT_MS", "0"),
            ("LEDGER_REQUEST_TIMEOUT_MS", "-1"),
            ("LEDGER_USER_TABLE", " "),
        ] {
            let err = LedgerConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { key: k, .. } if k == key),
                "{key}={value}"
            );
        }
    }
}
