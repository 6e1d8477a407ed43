//! CVaR-skewed policy comparison for local policy search.
//!
//! Two policies are ranked by the mean of their cumulative-reward
//! distributions after the most favourable `skewing_factor` of probability
//! mass has been cut away ([`RewardDistribution::skew_removing_upper_tail`]),
//! so a thin tail of very high rewards cannot win a comparison.
//!
//! The comparison looks at two states:
//!
//! - the **origin** `s0`, whose value is what the search optimizes, and
//! - the **studied state**, where the two candidate policies differ.
//!
//! Repeated backward induction and repeated tail cuts accumulate rounding
//! error at the origin, so small differences there are not trusted. Unless
//! the origin distributions are ordered by strong stochastic dominance, the
//! decision is taken from the skewed means at the studied state, where the
//! perturbation is measured directly, with differences below
//! [`TIE_THRESHOLD`] reported as ties.
//!
//! # Sequential use only
//!
//! The resulting relation is **not transitive** across arbitrary policy
//! pairs: which state breaks a tie depends on the `studied` argument. It is
//! sound for a search driver that compares a policy with a single-state
//! perturbation of itself and passes the perturbed state as `studied`. Do not
//! hand it to a sort routine expecting a total order.

use std::cmp::Ordering;

use tracing::trace;

use crate::config::AccuracyConfig;
use crate::constants::TIE_THRESHOLD;
use crate::distribution::tail::check_skewing_factor;
use crate::distribution::RewardDistribution;
use crate::error::{Result, RiskError};
use crate::types::{Mdp, Policy};
use crate::value_function::{compute_value_function, ValueFunction};

/// Ranks policies of one MDP from one origin state.
///
/// Holds no mutable state: the studied state is an argument of each
/// comparison, so a comparator can be shared across threads as long as the
/// MDP can.
pub struct PolicyRiskComparator<'a, M: Mdp> {
    origin: M::State,
    mdp: &'a M,
    horizon: usize,
    accuracy: AccuracyConfig,
    skewing_factor: f64,
}

/// The four skewed distributions a comparison decides on, plus the unskewed
/// origin distributions used for the dominance test.
struct Evidence<'v> {
    origin_1: &'v RewardDistribution,
    origin_2: &'v RewardDistribution,
    skewed_origin_1: RewardDistribution,
    skewed_origin_2: RewardDistribution,
    skewed_studied_1: RewardDistribution,
    skewed_studied_2: RewardDistribution,
}

impl<'a, M: Mdp> PolicyRiskComparator<'a, M> {
    /// `skewing_factor` must lie in `[0, 1)`; `origin` must be a state of
    /// `mdp`.
    pub fn new(
        origin: M::State,
        mdp: &'a M,
        horizon: usize,
        accuracy: AccuracyConfig,
        skewing_factor: f64,
    ) -> Result<Self> {
        accuracy.validate()?;
        check_skewing_factor(skewing_factor)?;
        if !mdp.states().contains(&origin) {
            return Err(RiskError::invalid(format!(
                "origin state {origin:?} is not a state of the MDP"
            )));
        }
        Ok(Self {
            origin,
            mdp,
            horizon,
            accuracy,
            skewing_factor,
        })
    }

    pub fn origin(&self) -> &M::State {
        &self.origin
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn accuracy(&self) -> AccuracyConfig {
        self.accuracy
    }

    pub fn skewing_factor(&self) -> f64 {
        self.skewing_factor
    }

    /// Value function of `policy` under this comparator's horizon and
    /// accuracy. Drivers that compare one incumbent against many candidates
    /// can compute it once and use [`Self::compare_value_functions`].
    pub fn value_function<P>(&self, policy: &P) -> Result<ValueFunction<M::State>>
    where
        P: Policy<M::State, M::Action> + ?Sized,
    {
        compute_value_function(self.mdp, policy, self.horizon, self.accuracy)
    }

    /// Rank `p1` against `p2`: `Greater` if `p1` is preferred, `Less` if `p2`
    /// is, `Equal` for a tie. `studied` is the state where the two policies
    /// are being told apart.
    pub fn compare<P1, P2>(&self, p1: &P1, p2: &P2, studied: &M::State) -> Result<Ordering>
    where
        P1: Policy<M::State, M::Action> + ?Sized,
        P2: Policy<M::State, M::Action> + ?Sized,
    {
        let vf1 = self.value_function(p1)?;
        let vf2 = self.value_function(p2)?;
        self.compare_value_functions(&vf1, &vf2, studied)
    }

    /// [`Self::compare`] on value functions already computed with this
    /// comparator's horizon and accuracy.
    pub fn compare_value_functions(
        &self,
        vf1: &ValueFunction<M::State>,
        vf2: &ValueFunction<M::State>,
        studied: &M::State,
    ) -> Result<Ordering> {
        for vf in [vf1, vf2] {
            if vf.horizon() != self.horizon || vf.accuracy() != self.accuracy {
                return Err(RiskError::invalid(format!(
                    "value function built for horizon {} / {:?}, comparator uses horizon {} / {:?}",
                    vf.horizon(),
                    vf.accuracy(),
                    self.horizon,
                    self.accuracy
                )));
            }
        }

        let evidence = self.gather(vf1, vf2, studied)?;
        Ok(self.decide(&evidence))
    }

    fn gather<'v>(
        &self,
        vf1: &'v ValueFunction<M::State>,
        vf2: &'v ValueFunction<M::State>,
        studied: &M::State,
    ) -> Result<Evidence<'v>> {
        let origin_1 = vf1.get(&self.origin)?;
        let origin_2 = vf2.get(&self.origin)?;
        let studied_1 = vf1.get(studied)?;
        let studied_2 = vf2.get(studied)?;

        Ok(Evidence {
            origin_1,
            origin_2,
            skewed_origin_1: origin_1.skew_removing_upper_tail(self.skewing_factor)?,
            skewed_origin_2: origin_2.skew_removing_upper_tail(self.skewing_factor)?,
            skewed_studied_1: studied_1.skew_removing_upper_tail(self.skewing_factor)?,
            skewed_studied_2: studied_2.skew_removing_upper_tail(self.skewing_factor)?,
        })
    }

    fn decide(&self, e: &Evidence<'_>) -> Ordering {
        let v1 = e.skewed_origin_1.average_reward();
        let v2 = e.skewed_origin_2.average_reward();
        let diff_studied =
            e.skewed_studied_1.average_reward() - e.skewed_studied_2.average_reward();

        // Provisional preference at the origin. Strong dominance of the raw
        // distributions makes the margin unbounded: the ordering is certain.
        let mut margin: f64 = 0.0;
        let mut p1_ahead = false;
        let dominance_1 = e.origin_1.is_strongly_dominating(e.origin_2);
        if (v1 > v2 && v1 - v2 > margin) || dominance_1 {
            margin = if dominance_1 { f64::INFINITY } else { v1 - v2 };
            p1_ahead = true;
        }
        let dominance_2 = e.origin_2.is_strongly_dominating(e.origin_1);
        if (v2 > v1 && v2 - v1 > margin) || dominance_2 {
            margin = if dominance_2 { f64::INFINITY } else { v2 - v1 };
            p1_ahead = false;
        }

        if margin.is_finite() {
            let ordering = if diff_studied.abs() < TIE_THRESHOLD {
                Ordering::Equal
            } else if diff_studied < 0.0 {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            trace!(v1, v2, margin, diff_studied, ?ordering, "decided at studied state");
            return ordering;
        }

        let ordering = if e.skewed_origin_1.is_strongly_dominating(&e.skewed_origin_2) {
            Ordering::Greater
        } else if e.skewed_origin_2.is_strongly_dominating(&e.skewed_origin_1) {
            Ordering::Less
        } else if p1_ahead {
            Ordering::Greater
        } else {
            Ordering::Less
        };
        trace!(v1, v2, p1_ahead, ?ordering, "decided by dominance at origin");
        ordering
    }
}
