//! Tail operations: CVaR skewing, quantiles and stochastic dominance.

use crate::error::{Result, RiskError};

use super::RewardDistribution;

impl RewardDistribution {
    /// Remove the most favourable `skewing_factor` of probability mass and
    /// renormalize.
    ///
    /// Buckets are removed whole from the top while the removed mass stays
    /// within `skewing_factor`; the boundary bucket loses only the fraction
    /// needed to reach it exactly. The result is the distribution conditioned
    /// on the lower `1 - skewing_factor` quantile, whose mean is the CVaR.
    ///
    /// `skewing_factor` must lie in `[0, 1)`; `0` returns an equal copy.
    pub fn skew_removing_upper_tail(&self, skewing_factor: f64) -> Result<Self> {
        check_skewing_factor(skewing_factor)?;
        if skewing_factor == 0.0 {
            return Ok(self.clone());
        }

        let mut removed = 0.0;
        let mut kept: Vec<(f64, f64)> = Vec::with_capacity(self.buckets.len());
        for &(value, mass) in self.buckets.iter().rev() {
            if removed >= skewing_factor {
                kept.push((value, mass));
            } else if removed + mass <= skewing_factor {
                removed += mass;
            } else {
                kept.push((value, mass - (skewing_factor - removed)));
                removed = skewing_factor;
            }
        }

        // Total mass may sit slightly below 1, leaving nothing for a factor
        // close to 1: the lowest outcome is then the whole conditional tail.
        if kept.is_empty() {
            return Self::point_mass(self.min_value(), self.accuracy);
        }

        kept.reverse();
        // Renormalize by the mass actually kept (1 - skewing_factor for an exact
        // distribution) so input drift within epsilon is not amplified.
        let remaining: f64 = kept.iter().map(|&(_, p)| p).sum();
        for bucket in &mut kept {
            bucket.1 /= remaining;
        }
        Self::build(kept, self.accuracy)
    }

    /// `P(X >= threshold)`.
    pub fn survival_at(&self, threshold: f64) -> f64 {
        self.buckets
            .iter()
            .rev()
            .take_while(|&&(v, _)| v >= threshold)
            .map(|&(_, p)| p)
            .sum()
    }

    /// `P(X <= threshold)`.
    pub fn cumulative_at(&self, threshold: f64) -> f64 {
        self.buckets
            .iter()
            .take_while(|&&(v, _)| v <= threshold)
            .map(|&(_, p)| p)
            .sum()
    }

    /// Lower `level`-quantile: the smallest value whose cumulative mass
    /// reaches `level` (within epsilon). `level` must lie in `(0, 1]`.
    pub fn value_at_risk(&self, level: f64) -> Result<f64> {
        check_tail_level(level)?;
        let target = level - self.accuracy.epsilon;
        let mut cumulative = 0.0;
        for &(value, mass) in &self.buckets {
            cumulative += mass;
            if cumulative >= target {
                return Ok(value);
            }
        }
        Ok(self.max_value())
    }

    /// Mean of the worst `level` fraction of outcomes (lower-tail CVaR).
    /// `level = 1` is the plain mean.
    pub fn cvar(&self, level: f64) -> Result<f64> {
        check_tail_level(level)?;
        let skewing_factor = 1.0 - level;
        // Levels below f64 resolution near 1 leave only the worst outcome.
        if skewing_factor >= 1.0 {
            return Ok(self.min_value());
        }
        Ok(self.skew_removing_upper_tail(skewing_factor)?.average_reward())
    }

    /// First-order stochastic dominance with tolerance.
    ///
    /// True iff `P(self >= t) >= P(other >= t) - epsilon` at every threshold
    /// `t` in either support, and `P(self >= t) > P(other >= t) + epsilon` at
    /// one of them at least. Irreflexive and antisymmetric, but only a
    /// tolerant partial order: many pairs are incomparable.
    pub fn is_strongly_dominating(&self, other: &RewardDistribution) -> bool {
        let epsilon = self.accuracy.epsilon;
        let mut thresholds: Vec<f64> = self
            .buckets
            .iter()
            .chain(other.buckets.iter())
            .map(|&(v, _)| v)
            .collect();
        thresholds.sort_by(|a, b| b.total_cmp(a));
        thresholds.dedup();

        let (mut i, mut j) = (self.buckets.len(), other.buckets.len());
        let (mut survival_self, mut survival_other) = (0.0, 0.0);
        let mut strictly_above = false;

        for t in thresholds {
            while i > 0 && self.buckets[i - 1].0 >= t {
                survival_self += self.buckets[i - 1].1;
                i -= 1;
            }
            while j > 0 && other.buckets[j - 1].0 >= t {
                survival_other += other.buckets[j - 1].1;
                j -= 1;
            }
            if survival_self < survival_other - epsilon {
                return false;
            }
            if survival_self > survival_other + epsilon {
                strictly_above = true;
            }
        }
        strictly_above
    }
}

pub(crate) fn check_skewing_factor(skewing_factor: f64) -> Result<()> {
    if (0.0..1.0).contains(&skewing_factor) {
        Ok(())
    } else {
        Err(RiskError::invalid(format!(
            "skewing factor must lie in [0, 1), got {skewing_factor}"
        )))
    }
}

fn check_tail_level(level: f64) -> Result<()> {
    if level > 0.0 && level <= 1.0 {
        Ok(())
    } else {
        Err(RiskError::invalid(format!(
            "tail level must lie in (0, 1], got {level}"
        )))
    }
}
