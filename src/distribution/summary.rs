//! Summary statistics of a reward distribution, for driver-side reporting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::PERCENTILE_KEYS;
use crate::error::Result;

use super::RewardDistribution;

/// Exact statistics of a [`RewardDistribution`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    /// Percentiles: p1, p5, p10, p25, p50, p75, p90, p95, p99.
    pub percentiles: BTreeMap<String, f64>,
    /// Tail level the `cvar` field was computed at.
    pub cvar_level: f64,
    /// Mean of the worst `cvar_level` fraction of outcomes.
    pub cvar: f64,
    /// Number of buckets in the underlying distribution.
    pub buckets: usize,
}

impl DistributionSummary {
    pub fn new(dist: &RewardDistribution, cvar_level: f64) -> Result<Self> {
        let cvar = dist.cvar(cvar_level)?;
        let mean = dist.average_reward();
        let variance: f64 = dist
            .buckets()
            .iter()
            .map(|&(v, p)| (v - mean).powi(2) * p)
            .sum();

        let mut percentiles = BTreeMap::new();
        for key in PERCENTILE_KEYS {
            percentiles.insert(format!("p{key}"), dist.value_at_risk(key as f64 / 100.0)?);
        }

        Ok(Self {
            mean,
            variance,
            std_dev: variance.sqrt(),
            percentiles,
            cvar_level,
            cvar,
            buckets: dist.len(),
        })
    }
}

impl RewardDistribution {
    /// Mean, spread, percentiles and lower-tail CVaR at `cvar_level`.
    pub fn summary(&self, cvar_level: f64) -> Result<DistributionSummary> {
        DistributionSummary::new(self, cvar_level)
    }
}
