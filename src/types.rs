//! Interfaces to the collaborators this crate evaluates: the MDP and its
//! policies.
//!
//! States and actions are opaque identities. Nothing here looks inside them;
//! they are map keys and kernel inputs. The bounds (`Clone + Eq + Hash`) are
//! what backward induction needs to memoize a layer per state, `Debug` feeds
//! error messages, and `Send + Sync` lets a layer be computed in parallel.

use std::fmt::Debug;
use std::hash::Hash;

use crate::config::AccuracyConfig;
use crate::distribution::RewardDistribution;
use crate::error::Result;

/// Identity type usable as a state or an action.
pub trait Identity: Clone + Eq + Hash + Debug + Send + Sync {}

impl<T: Clone + Eq + Hash + Debug + Send + Sync> Identity for T {}

/// Reward earned on a single transition.
#[derive(Debug, Clone, PartialEq)]
pub enum RewardContribution {
    Scalar(f64),
    Distributed(RewardDistribution),
}

impl RewardContribution {
    /// The contribution as a distribution under `accuracy`.
    pub fn to_distribution(&self, accuracy: AccuracyConfig) -> Result<RewardDistribution> {
        match self {
            Self::Scalar(value) => RewardDistribution::point_mass(*value, accuracy),
            Self::Distributed(dist) => dist.with_accuracy(accuracy),
        }
    }
}

impl From<f64> for RewardContribution {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<RewardDistribution> for RewardContribution {
    fn from(dist: RewardDistribution) -> Self {
        Self::Distributed(dist)
    }
}

/// One outcome of taking an action: land in `next_state` with `probability`,
/// earning `reward`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S> {
    pub next_state: S,
    pub probability: f64,
    pub reward: RewardContribution,
}

impl<S> Transition<S> {
    pub fn new(next_state: S, probability: f64, reward: impl Into<RewardContribution>) -> Self {
        Self {
            next_state,
            probability,
            reward: reward.into(),
        }
    }
}

/// A finite Markov Decision Process, read-only for the duration of a
/// computation.
pub trait Mdp: Sync {
    type State: Identity;
    type Action: Identity;

    /// The declared state domain. Backward induction evaluates every one.
    fn states(&self) -> &[Self::State];

    /// Outcomes of `action` in `state`, probabilities summing to 1.
    ///
    /// `None` means the pair is not part of the model.
    fn transitions(
        &self,
        state: &Self::State,
        action: &Self::Action,
    ) -> Option<Vec<Transition<Self::State>>>;

    /// Discount applied to the continuation after each step, in `[0, 1)`.
    fn discount_factor(&self) -> f64;

    /// Reward credited when the horizon runs out in `state`.
    fn terminal_reward(&self, _state: &Self::State) -> f64 {
        0.0
    }
}

/// A (possibly stochastic) rule choosing actions.
pub trait Policy<S, A>: Sync {
    /// Actions taken at `state` with their probabilities, summing to 1.
    /// Deterministic policies return a single action with probability 1.
    ///
    /// `None` means the policy does not cover `state`.
    fn actions_at(&self, state: &S) -> Option<Vec<(A, f64)>>;
}
