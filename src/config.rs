//! Ledger configuration with safe defaults and fail-fast validation.

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Default retention sweep interval in milliseconds (15 seconds).
pub const DEFAULT_PURGE_INTERVAL_MS: u64 = 15_000;

/// Default key rotation interval in milliseconds (24 hours).
pub const DEFAULT_ROTATION_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// Default cumulative privacy budget (epsilon).
pub const DEFAULT_PRIVACY_BUDGET: f64 = 1.0;

/// Default Laplace noise scale applied to numeric payload fields.
pub const DEFAULT_NOISE_SCALE: f64 = 1.0;

/// Default block difficulty in leading zero bits.
pub const DEFAULT_LEDGER_DIFFICULTY: u32 = 8;

/// Ceiling on block difficulty. Expected nonce-search work doubles per bit;
/// 20 bits keeps the worst observed append under a few hundred milliseconds
/// on commodity hardware.
pub const MAX_LEDGER_DIFFICULTY: u32 = 20;

/// Default maximum chain length before bulk pruning.
pub const DEFAULT_MAX_BLOCKS: usize = 1024;

/// Default maximum record age in milliseconds (15 minutes).
pub const DEFAULT_MAX_RECORD_AGE_MS: u64 = 15 * 60 * 1000;

/// Construction-time configuration for [`crate::PrivacyLedger`].
///
/// All fields have safe defaults; [`LedgerConfig::validate`] rejects values
/// that would break a runtime guarantee before anything is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Retention sweep cadence. Bounds the worst-case exposure window of an
    /// expired record.
    pub purge_interval_ms: u64,
    /// Key epoch rotation cadence. Must be at least `max_record_age_ms` so
    /// no record outlives the epoch able to decrypt it.
    pub rotation_interval_ms: u64,
    /// Cumulative privacy budget (epsilon) across all tracked events.
    pub total_privacy_budget: f64,
    /// Laplace noise scale applied to every numeric payload field.
    pub noise_scale: f64,
    /// Leading zero bits required of every sealed block hash. A cost
    /// tunable for a single writer, not a consensus parameter.
    pub ledger_difficulty: u32,
    /// Maximum chain length; exceeding it triggers a bulk prune down to
    /// genesis plus the newest `max_blocks - 1` blocks.
    pub max_blocks: usize,
    /// Retention window: a record is destroyed once this much time has
    /// passed since it was tracked.
    pub max_record_age_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            purge_interval_ms: DEFAULT_PURGE_INTERVAL_MS,
            rotation_interval_ms: DEFAULT_ROTATION_INTERVAL_MS,
            total_privacy_budget: DEFAULT_PRIVACY_BUDGET,
            noise_scale: DEFAULT_NOISE_SCALE,
            ledger_difficulty: DEFAULT_LEDGER_DIFFICULTY,
            max_blocks: DEFAULT_MAX_BLOCKS,
            max_record_age_ms: DEFAULT_MAX_RECORD_AGE_MS,
        }
    }
}

impl LedgerConfig {
    /// Validate every field. Called by the ledger constructor; errors here
    /// are fatal and nothing is built.
    pub fn validate(&self) -> Result<()> {
        if self.purge_interval_ms == 0 {
            return Err(LedgerError::Configuration(
                "purge_interval_ms must be positive".to_string(),
            ));
        }
        if self.rotation_interval_ms == 0 {
            return Err(LedgerError::Configuration(
                "rotation_interval_ms must be positive".to_string(),
            ));
        }
        if !self.total_privacy_budget.is_finite() || self.total_privacy_budget <= 0.0 {
            return Err(LedgerError::Configuration(format!(
                "total_privacy_budget must be positive and finite, got {}",
                self.total_privacy_budget
            )));
        }
        if !self.noise_scale.is_finite() || self.noise_scale <= 0.0 {
            return Err(LedgerError::Configuration(format!(
                "noise_scale must be positive and finite, got {}",
                self.noise_scale
            )));
        }
        if self.ledger_difficulty > MAX_LEDGER_DIFFICULTY {
            return Err(LedgerError::Configuration(format!(
                "ledger_difficulty must be at most {} bits, got {}",
                MAX_LEDGER_DIFFICULTY, self.ledger_difficulty
            )));
        }
        if self.max_blocks < 2 {
            return Err(LedgerError::Configuration(
                "max_blocks must be at least 2 (genesis plus one event block)".to_string(),
            ));
        }
        if self.max_record_age_ms == 0 {
            return Err(LedgerError::Configuration(
                "max_record_age_ms must be positive".to_string(),
            ));
        }
        // Records sealed under an epoch must expire before that epoch's
        // keys can be two rotations old.
        if self.rotation_interval_ms < self.max_record_age_ms {
            return Err(LedgerError::Configuration(format!(
                "rotation_interval_ms ({}) must be at least max_record_age_ms ({}): \
                 otherwise records outlive the keys that sealed them",
                self.rotation_interval_ms, self.max_record_age_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(LedgerConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_purge_interval() {
        let config = LedgerConfig {
            purge_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_rotation_interval() {
        let config = LedgerConfig {
            rotation_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_budget() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let config = LedgerConfig {
                total_privacy_budget: bad,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "budget {} accepted", bad);
        }
    }

    #[test]
    fn rejects_non_positive_noise_scale() {
        for bad in [0.0, -0.5, f64::NAN] {
            let config = LedgerConfig {
                noise_scale: bad,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "noise_scale {} accepted", bad);
        }
    }

    #[test]
    fn rejects_excessive_difficulty() {
        let config = LedgerConfig {
            ledger_difficulty: MAX_LEDGER_DIFFICULTY + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_tiny_max_blocks() {
        let config = LedgerConfig {
            max_blocks: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_rotation_shorter_than_retention() {
        let config = LedgerConfig {
            rotation_interval_ms: 1_000,
            max_record_age_ms: 2_000,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("rotation_interval_ms"));
    }

    #[test]
    fn rotation_equal_to_retention_is_allowed() {
        let config = LedgerConfig {
            rotation_interval_ms: 15_000,
            max_record_age_ms: 15_000,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn serde_round_trip() {
        let config = LedgerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: LedgerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
