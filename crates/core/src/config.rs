use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{dispatch::RetryPolicy, funding::AllocationPolicy};

/// Smallest multiplier accepted for native-currency funding.
pub const MIN_NATIVE_SAFETY_MULTIPLIER: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("native_safety_multiplier must be at least {MIN_NATIVE_SAFETY_MULTIPLIER}, got {0}")]
    SafetyMultiplierTooLow(u64),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Tunables for funding and dispatch. Every field has a default, so a config
/// file only needs to name what it overrides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Transactions per JSON-RPC batch call in grouped-batch mode.
    pub batch_size: usize,
    pub receipt_timeout_secs: u64,
    pub receipt_poll_interval_ms: u64,
    /// Upper bound on concurrent balance/nonce queries.
    pub query_concurrency: usize,
    pub allocation_policy: AllocationPolicy,
    pub native_safety_multiplier: u64,
    pub batch_retry: RetryPolicy,
    pub send_retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            receipt_timeout_secs: 60,
            receipt_poll_interval_ms: 1000,
            query_concurrency: 16,
            allocation_policy: AllocationPolicy::default(),
            native_safety_multiplier: MIN_NATIVE_SAFETY_MULTIPLIER,
            batch_retry: RetryPolicy::new(5),
            send_retry: RetryPolicy::new(3),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.native_safety_multiplier < MIN_NATIVE_SAFETY_MULTIPLIER {
            return Err(ConfigError::SafetyMultiplierTooLow(
                self.native_safety_multiplier,
            ));
        }
        if self.query_concurrency == 0 {
            return Err(ConfigError::Zero("query_concurrency"));
        }
        if self.batch_retry.max_attempts == 0 {
            return Err(ConfigError::Zero("batch_retry.max_attempts"));
        }
        if self.send_retry.max_attempts == 0 {
            return Err(ConfigError::Zero("send_retry.max_attempts"));
        }
        Ok(())
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}
