//! Discretized cumulative-reward distributions.
//!
//! A [`RewardDistribution`] is a finite PMF over reward values: buckets
//! `(value, probability)` sorted by strictly increasing value, every
//! probability positive, total mass `1 ± epsilon`. Each distribution carries
//! the [`AccuracyConfig`] it was built with, and every operation returns a
//! fresh, compressed instance that satisfies the same invariants:
//!
//! - at most `granularity` buckets (see [`compress`])
//! - no bucket lighter than `epsilon` unless it is the only one
//! - no two buckets closer than `epsilon` in value
//!
//! Compression merges, it never drops mass, and a merged bucket sits at the
//! probability-weighted mean of its parts, so the mean is preserved exactly
//! (up to floating-point rounding).

pub mod compress;
pub mod summary;
pub mod tail;

use crate::config::AccuracyConfig;
use crate::error::{Result, RiskError};

/// Exact (up to discretization) distribution of cumulative reward.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardDistribution {
    buckets: Vec<(f64, f64)>,
    accuracy: AccuracyConfig,
}

impl RewardDistribution {
    /// All mass at a single reward value.
    pub fn point_mass(value: f64, accuracy: AccuracyConfig) -> Result<Self> {
        accuracy.validate()?;
        if !value.is_finite() {
            return Err(RiskError::invalid(format!(
                "reward value must be finite, got {value}"
            )));
        }
        Ok(Self {
            buckets: vec![(value, 1.0)],
            accuracy,
        })
    }

    /// Build from arbitrary `(value, probability)` pairs.
    ///
    /// Pairs may be unsorted and may repeat values; zero-probability pairs are
    /// ignored. The pairs must describe a probability distribution: a negative
    /// probability or a total mass outside `1 ± epsilon` is rejected.
    pub fn from_buckets(
        pairs: impl IntoIterator<Item = (f64, f64)>,
        accuracy: AccuracyConfig,
    ) -> Result<Self> {
        accuracy.validate()?;
        Self::build(pairs.into_iter().collect(), accuracy)
    }

    /// Weighted mixture of distributions: with probability `w_i` the outcome
    /// is drawn from the `i`-th component. Weights must sum to 1.
    pub fn mixture<'a>(
        components: impl IntoIterator<Item = (f64, &'a RewardDistribution)>,
        accuracy: AccuracyConfig,
    ) -> Result<Self> {
        accuracy.validate()?;
        let mut raw = Vec::new();
        for (weight, dist) in components {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(RiskError::invalid(format!(
                    "mixture weight must be finite and non-negative, got {weight}"
                )));
            }
            if weight == 0.0 {
                continue;
            }
            raw.extend(dist.buckets.iter().map(|&(v, p)| (v, weight * p)));
        }
        Self::build(raw, accuracy)
    }

    /// The same distribution re-expressed under another accuracy config.
    pub fn with_accuracy(&self, accuracy: AccuracyConfig) -> Result<Self> {
        if accuracy == self.accuracy {
            return Ok(self.clone());
        }
        accuracy.validate()?;
        Self::build(self.buckets.clone(), accuracy)
    }

    pub fn buckets(&self) -> &[(f64, f64)] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Always false: a distribution holds at least one bucket.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn accuracy(&self) -> AccuracyConfig {
        self.accuracy
    }

    pub fn total_mass(&self) -> f64 {
        self.buckets.iter().map(|&(_, p)| p).sum()
    }

    pub fn min_value(&self) -> f64 {
        self.buckets.first().map_or(0.0, |&(v, _)| v)
    }

    pub fn max_value(&self) -> f64 {
        self.buckets.last().map_or(0.0, |&(v, _)| v)
    }

    /// Probability-weighted mean reward.
    pub fn average_reward(&self) -> f64 {
        self.buckets.iter().map(|&(v, p)| v * p).sum()
    }

    /// Distribution of `self + weight * other` for independent outcomes.
    ///
    /// Backward induction folds a successor's distribution into a transition
    /// reward with `weight` set to the discount factor. The cross product of
    /// buckets is compressed back under `granularity`.
    pub fn combine(&self, other: &RewardDistribution, weight: f64) -> Result<Self> {
        if !weight.is_finite() {
            return Err(RiskError::invalid(format!(
                "combination weight must be finite, got {weight}"
            )));
        }
        let mut raw = Vec::with_capacity(self.buckets.len() * other.buckets.len());
        for &(a, pa) in &self.buckets {
            for &(b, pb) in &other.buckets {
                raw.push((a + weight * b, pa * pb));
            }
        }
        Self::build(raw, self.accuracy)
    }

    /// Every reward value multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Result<Self> {
        if !factor.is_finite() {
            return Err(RiskError::invalid(format!(
                "scale factor must be finite, got {factor}"
            )));
        }
        let raw = self.buckets.iter().map(|&(v, p)| (v * factor, p)).collect();
        Self::build(raw, self.accuracy)
    }

    /// Every reward value moved by `offset`.
    pub fn shifted(&self, offset: f64) -> Result<Self> {
        if !offset.is_finite() {
            return Err(RiskError::invalid(format!(
                "shift offset must be finite, got {offset}"
            )));
        }
        let raw = self.buckets.iter().map(|&(v, p)| (v + offset, p)).collect();
        Self::build(raw, self.accuracy)
    }

    /// Sort, compress and validate raw buckets into a distribution.
    fn build(mut raw: Vec<(f64, f64)>, accuracy: AccuracyConfig) -> Result<Self> {
        for &(v, p) in &raw {
            if !v.is_finite() {
                return Err(RiskError::invalid(format!(
                    "reward value must be finite, got {v}"
                )));
            }
            if !p.is_finite() || p < 0.0 {
                return Err(RiskError::DistributionInvariantViolation {
                    detail: format!("bucket at value {v} has probability {p}"),
                    total_mass: raw.iter().map(|&(_, q)| q).sum(),
                    epsilon: accuracy.epsilon,
                });
            }
        }
        raw.retain(|&(_, p)| p > 0.0);
        raw.sort_by(|a, b| a.0.total_cmp(&b.0));

        let buckets = compress::compress(raw, &accuracy);
        let dist = Self { buckets, accuracy };
        dist.check_invariants()?;
        Ok(dist)
    }

    /// Fail loudly if the mass drifted outside tolerance or the bucket
    /// structure is broken.
    pub fn check_invariants(&self) -> Result<()> {
        let total_mass = self.total_mass();
        let epsilon = self.accuracy.epsilon;
        let violation = |detail: String| RiskError::DistributionInvariantViolation {
            detail,
            total_mass,
            epsilon,
        };

        if self.buckets.is_empty() {
            return Err(violation("distribution has no buckets".to_string()));
        }
        if (total_mass - 1.0).abs() > epsilon {
            return Err(violation("probabilities do not sum to 1".to_string()));
        }
        if self.buckets.len() > self.accuracy.granularity {
            return Err(violation(format!(
                "{} buckets exceed granularity {}",
                self.buckets.len(),
                self.accuracy.granularity
            )));
        }
        if let Some(&(v, p)) = self.buckets.iter().find(|&&(_, p)| p <= 0.0) {
            return Err(violation(format!(
                "bucket at value {v} has non-positive probability {p}"
            )));
        }
        if self.buckets.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(violation("bucket values are not strictly increasing".to_string()));
        }
        Ok(())
    }
}
