//! Configuration types for the issuance engine
//!
//! Durations are written as humantime strings (`"10m"`, `"1h 30m"`). Every
//! field has a default, so an empty document yields
//! [`EngineConfig::default`].

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::{IssuanceError, Result};

/// Shortest and longest accepted PIN
const TX_CODE_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 4..=8;

/// Configuration for the issuance engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Lifetime of a cached credential offer
    #[serde(with = "humantime_serde")]
    pub offer_ttl: Duration,

    /// Lifetime of a pre-authorization grant
    #[serde(with = "humantime_serde")]
    pub grant_ttl: Duration,

    /// Digits in a transaction code
    pub tx_code_length: usize,

    /// Time between evictions of expired offers and grants
    #[serde(with = "humantime_serde")]
    pub purge_interval: Duration,

    /// Expiration sweep settings
    pub expiration: ExpirationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            offer_ttl: Duration::from_secs(10 * 60),
            grant_ttl: Duration::from_secs(5 * 60),
            tx_code_length: 4,
            purge_interval: Duration::from_secs(60),
            expiration: ExpirationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.offer_ttl.is_zero() {
            return Err(IssuanceError::Validation(
                "offer_ttl must be greater than zero".to_string(),
            ));
        }
        if self.grant_ttl.is_zero() {
            return Err(IssuanceError::Validation(
                "grant_ttl must be greater than zero".to_string(),
            ));
        }
        if !TX_CODE_LENGTH_RANGE.contains(&self.tx_code_length) {
            return Err(IssuanceError::Validation(format!(
                "tx_code_length must be within {}..={}, got {}",
                TX_CODE_LENGTH_RANGE.start(),
                TX_CODE_LENGTH_RANGE.end(),
                self.tx_code_length
            )));
        }
        if self.purge_interval.is_zero() {
            return Err(IssuanceError::Validation(
                "purge_interval must be greater than zero".to_string(),
            ));
        }
        if let ExpirationSchedule::Every { interval } = self.expiration.schedule {
            if interval.is_zero() {
                return Err(IssuanceError::Validation(
                    "expiration interval must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Expiration sweep settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpirationConfig {
    /// Run the scheduled sweep; when false the background loop exits at
    /// once and only explicit sweeps run
    pub enabled: bool,

    /// When sweeps run
    pub schedule: ExpirationSchedule,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule: ExpirationSchedule::default(),
        }
    }
}

/// When the expiration sweep runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpirationSchedule {
    /// Once a day at a fixed local time
    DailyAt {
        /// Local wall-clock time, e.g. `"01:00:00"`
        at: NaiveTime,
    },
    /// At a fixed interval from process start
    Every {
        /// Time between sweeps
        #[serde(with = "humantime_serde")]
        interval: Duration,
    },
}

impl Default for ExpirationSchedule {
    fn default() -> Self {
        Self::DailyAt {
            at: NaiveTime::from_hms_opt(1, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config: EngineConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_humantime_durations() {
        let config: EngineConfig = serde_json::from_value(json!({
            "offer_ttl": "2m",
            "grant_ttl": "90s",
            "tx_code_length": 6,
            "purge_interval": "30s",
            "expiration": {
                "enabled": true,
                "schedule": { "kind": "every", "interval": "1h" }
            }
        }))
        .unwrap();

        assert_eq!(config.offer_ttl, Duration::from_secs(120));
        assert_eq!(config.grant_ttl, Duration::from_secs(90));
        assert_eq!(config.tx_code_length, 6);
        assert_eq!(config.purge_interval, Duration::from_secs(30));
        assert_eq!(
            config.expiration.schedule,
            ExpirationSchedule::Every {
                interval: Duration::from_secs(3600)
            }
        );
    }

    #[test]
    fn test_daily_schedule() {
        let config: EngineConfig = serde_json::from_value(json!({
            "expiration": { "schedule": { "kind": "daily_at", "at": "03:30:00" } }
        }))
        .unwrap();

        assert_eq!(
            config.expiration.schedule,
            ExpirationSchedule::DailyAt {
                at: NaiveTime::from_hms_opt(3, 30, 0).unwrap()
            }
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let zero_ttl = EngineConfig {
            offer_ttl: Duration::ZERO,
            ..EngineConfig::default()
        };
        assert!(zero_ttl.validate().is_err());

        let short_pin = EngineConfig {
            tx_code_length: 3,
            ..EngineConfig::default()
        };
        assert!(short_pin.validate().is_err());

        let zero_purge = EngineConfig {
            purge_interval: Duration::ZERO,
            ..EngineConfig::default()
        };
        assert!(zero_purge.validate().is_err());

        let zero_interval = EngineConfig {
            expiration: ExpirationConfig {
                enabled: true,
                schedule: ExpirationSchedule::Every {
                    interval: Duration::ZERO,
                },
            },
            ..EngineConfig::default()
        };
        assert!(zero_interval.validate().is_err());
    }
}
