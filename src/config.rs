//! Discretization accuracy shared by every distribution operation.
//!
//! `AccuracyConfig` is a small `Copy` value carried by each
//! [`RewardDistribution`](crate::distribution::RewardDistribution), so the
//! operations on a distribution never need the configuration passed again.
//! Drivers that keep their settings in a file can embed it directly; missing
//! fields fall back to the defaults in [`crate::constants`].

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_EPSILON, DEFAULT_GRANULARITY};
use crate::error::{Result, RiskError};

/// Bounds on distribution resolution and merge tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyConfig {
    /// Maximum number of buckets retained after any operation.
    #[serde(default = "default_granularity")]
    pub granularity: usize,

    /// Minimum bucket mass and value gap; tolerance for sums and comparisons.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_granularity() -> usize {
    DEFAULT_GRANULARITY
}

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

impl Default for AccuracyConfig {
    fn default() -> Self {
        Self {
            granularity: DEFAULT_GRANULARITY,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl AccuracyConfig {
    /// Build a validated config.
    pub fn new(granularity: usize, epsilon: f64) -> Result<Self> {
        let config = Self {
            granularity,
            epsilon,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check `granularity >= 1` and `0 < epsilon < 1`.
    ///
    /// Deserialized configs bypass [`AccuracyConfig::new`], so every consumer
    /// calls this before use.
    pub fn validate(&self) -> Result<()> {
        if self.granularity < 1 {
            return Err(RiskError::invalid(format!(
                "granularity must be at least 1, got {}",
                self.granularity
            )));
        }
        if !(self.epsilon > 0.0 && self.epsilon < 1.0) {
            return Err(RiskError::invalid(format!(
                "epsilon must lie in (0, 1), got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}
