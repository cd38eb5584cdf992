//! Configuration for the ledger and escrow engine.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{EducoinError, Result, constants};

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Opening minimum applied when an auction doesn't set one.
    pub default_min_bid: u64,
    /// How long an operation waits for a wallet or auction lock before
    /// failing with `LockTimeout`.
    pub lock_timeout_ms: u64,
    /// Maximum entries returned by a history query.
    pub history_limit: usize,
    pub reward: RewardPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_min_bid: constants::DEFAULT_MIN_BID,
            lock_timeout_ms: constants::DEFAULT_LOCK_TIMEOUT_MS,
            history_limit: constants::DEFAULT_HISTORY_LIMIT,
            reward: RewardPolicy::default(),
        }
    }
}

impl LedgerConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(raw)
            .map_err(|e| EducoinError::Configuration(format!("invalid config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_min_bid == 0 {
            return Err(EducoinError::Configuration(
                "default_min_bid must be at least 1".into(),
            ));
        }
        if self.lock_timeout_ms == 0 {
            return Err(EducoinError::Configuration(
                "lock_timeout_ms must be positive".into(),
            ));
        }
        if self.history_limit == 0 {
            return Err(EducoinError::Configuration(
                "history_limit must be positive".into(),
            ));
        }
        self.reward.validate()
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Grading reward bonus.
///
/// A grade at or above `bonus_threshold_percent` of the maximum grade earns
/// an extra `bonus_rate_percent` of the base reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardPolicy {
    pub bonus_threshold_percent: u32,
    pub bonus_rate_percent: u32,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            bonus_threshold_percent: constants::DEFAULT_BONUS_THRESHOLD_PERCENT,
            bonus_rate_percent: constants::DEFAULT_BONUS_RATE_PERCENT,
        }
    }
}

impl RewardPolicy {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("bonus_threshold_percent", self.bonus_threshold_percent),
            ("bonus_rate_percent", self.bonus_rate_percent),
        ] {
            if value > 100 {
                return Err(EducoinError::Configuration(format!(
                    "{name} {value} exceeds 100"
                )));
            }
        }
        Ok(())
    }
}
