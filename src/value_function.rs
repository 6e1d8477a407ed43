//! Backward induction: the exact distribution of cumulative reward at every
//! state, for a fixed policy and horizon.
//!
//! Layer `h` holds, for each state `s`, the distribution of reward collected
//! over the next `h` steps starting in `s`:
//!
//! ```text
//! V_0(s) = δ(terminal_reward(s))
//! V_h(s) = Σ_a π(a|s) Σ_s' P(s'|s,a) · [ R(s,a,s') ⊕ γ·V_{h-1}(s') ]
//! ```
//!
//! where `Σ` is a probability mixture (exactly one transition happens) and `⊕`
//! the independent sum of the transition reward and the discounted
//! continuation ([`RewardDistribution::combine`]).
//!
//! Layers are built in increasing `h` and only the previous layer is kept.
//! Within a layer every state reads only layer `h-1`, so states are computed
//! in parallel with rayon. Any failure aborts the whole computation; no
//! partial value function is ever returned.

use std::collections::HashMap;
use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;

use crate::config::AccuracyConfig;
use crate::distribution::summary::DistributionSummary;
use crate::distribution::RewardDistribution;
use crate::error::{Result, RiskError};
use crate::types::{Identity, Mdp, Policy};

/// Cumulative-reward distribution at every state of an MDP, for one policy
/// and horizon.
#[derive(Debug, Clone)]
pub struct ValueFunction<S> {
    values: HashMap<S, RewardDistribution>,
    horizon: usize,
    accuracy: AccuracyConfig,
}

impl<S: Identity> ValueFunction<S> {
    /// Distribution at `state`; states outside the MDP domain are an error.
    pub fn get(&self, state: &S) -> Result<&RewardDistribution> {
        self.values.get(state).ok_or_else(|| {
            RiskError::unresolved(format!("state {state:?} is not in the value function domain"))
        })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn accuracy(&self) -> AccuracyConfig {
        self.accuracy
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&S, &RewardDistribution)> {
        self.values.iter()
    }

    pub fn summary(&self, state: &S, cvar_level: f64) -> Result<DistributionSummary> {
        self.get(state)?.summary(cvar_level)
    }
}

/// Compute the value function of `policy` over `horizon` steps.
pub fn compute_value_function<M, P>(
    mdp: &M,
    policy: &P,
    horizon: usize,
    accuracy: AccuracyConfig,
) -> Result<ValueFunction<M::State>>
where
    M: Mdp,
    P: Policy<M::State, M::Action> + ?Sized,
{
    accuracy.validate()?;
    let discount = mdp.discount_factor();
    if !(0.0..1.0).contains(&discount) {
        return Err(RiskError::invalid(format!(
            "discount factor must lie in [0, 1), got {discount}"
        )));
    }
    let states = mdp.states();
    if states.is_empty() {
        return Err(RiskError::invalid("MDP declares no states"));
    }

    let t_total = Instant::now();

    let mut layer: HashMap<M::State, RewardDistribution> = states
        .par_iter()
        .map(|s| {
            RewardDistribution::point_mass(mdp.terminal_reward(s), accuracy)
                .map(|d| (s.clone(), d))
        })
        .collect::<Result<_>>()?;

    for h in 1..=horizon {
        let t_layer = Instant::now();
        let previous = &layer;

        let next: HashMap<M::State, RewardDistribution> = states
            .par_iter()
            .map(|s| backup(mdp, policy, s, previous, discount, accuracy).map(|d| (s.clone(), d)))
            .collect::<Result<_>>()?;

        debug!(
            horizon = h,
            states = next.len(),
            buckets = next.values().map(RewardDistribution::len).sum::<usize>(),
            elapsed_ms = t_layer.elapsed().as_secs_f64() * 1000.0,
            "value function layer computed"
        );
        layer = next;
    }

    debug!(
        horizon,
        states = layer.len(),
        elapsed_ms = t_total.elapsed().as_secs_f64() * 1000.0,
        "value function complete"
    );

    Ok(ValueFunction {
        values: layer,
        horizon,
        accuracy,
    })
}

/// One Bellman backup of the distribution at `state` against layer `h-1`.
fn backup<M, P>(
    mdp: &M,
    policy: &P,
    state: &M::State,
    previous: &HashMap<M::State, RewardDistribution>,
    discount: f64,
    accuracy: AccuracyConfig,
) -> Result<RewardDistribution>
where
    M: Mdp,
    P: Policy<M::State, M::Action> + ?Sized,
{
    let choices = policy.actions_at(state).ok_or_else(|| {
        RiskError::unresolved(format!("policy chooses no action at state {state:?}"))
    })?;
    let action_mass = checked_mass(choices.iter().map(|&(_, p)| p), accuracy.epsilon, || {
        format!("action probabilities at state {state:?}")
    })?;

    let mut parts: Vec<(f64, RewardDistribution)> = Vec::new();
    for (action, action_prob) in &choices {
        let outcomes = mdp.transitions(state, action).ok_or_else(|| {
            RiskError::unresolved(format!(
                "MDP has no transitions for action {action:?} at state {state:?}"
            ))
        })?;
        let outcome_mass =
            checked_mass(outcomes.iter().map(|t| t.probability), accuracy.epsilon, || {
                format!("transition probabilities of action {action:?} at state {state:?}")
            })?;

        for t in outcomes {
            let continuation = previous.get(&t.next_state).ok_or_else(|| {
                RiskError::unresolved(format!(
                    "transition {state:?} --{action:?}--> undeclared state {:?}",
                    t.next_state
                ))
            })?;
            let weight = (action_prob / action_mass) * (t.probability / outcome_mass);
            if weight == 0.0 {
                continue;
            }
            let reward = t.reward.to_distribution(accuracy)?;
            parts.push((weight, reward.combine(continuation, discount)?));
        }
    }

    RewardDistribution::mixture(parts.iter().map(|(w, d)| (*w, d)), accuracy)
}

/// Validate a probability vector and return its exact sum, so callers can
/// renormalize away drift within tolerance.
fn checked_mass(
    probabilities: impl Iterator<Item = f64>,
    epsilon: f64,
    what: impl Fn() -> String,
) -> Result<f64> {
    let mut total = 0.0;
    for p in probabilities {
        if !(p.is_finite() && p >= 0.0) {
            return Err(RiskError::invalid(format!("{}: invalid probability {p}", what())));
        }
        total += p;
    }
    if (total - 1.0).abs() > epsilon {
        return Err(RiskError::invalid(format!("{} sum to {total}", what())));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::{TabularMdp, TabularPolicy};

    /// Chain 0 -> 1 -> 2 -> 2 earning 1 per step, discount 0.5.
    fn chain() -> (TabularMdp<u8, char>, TabularPolicy<u8, char>) {
        let mut mdp = TabularMdp::new(0.5).unwrap();
        mdp.add_state(0).add_state(1).add_state(2);
        mdp.add_transition(0, 'n', 1, 1.0, 1.0)
            .add_transition(1, 'n', 2, 1.0, 1.0)
            .add_transition(2, 'n', 2, 1.0, 1.0);
        let policy = TabularPolicy::deterministic([(0, 'n'), (1, 'n'), (2, 'n')]);
        (mdp, policy)
    }

    #[test]
    fn test_horizon_zero_is_terminal_reward() {
        let (mut mdp, policy) = chain();
        mdp.set_terminal_reward(2, 4.0);
        let vf = compute_value_function(&mdp, &policy, 0, AccuracyConfig::default()).unwrap();
        assert_eq!(vf.horizon(), 0);
        assert_eq!(vf.get(&0).unwrap().buckets(), &[(0.0, 1.0)]);
        assert_eq!(vf.get(&2).unwrap().buckets(), &[(4.0, 1.0)]);
    }

    #[test]
    fn test_discounted_chain() {
        let (mdp, policy) = chain();
        let vf = compute_value_function(&mdp, &policy, 3, AccuracyConfig::default()).unwrap();
        // 1 + 0.5 + 0.25
        assert_eq!(vf.get(&0).unwrap().buckets(), &[(1.75, 1.0)]);
        assert_eq!(vf.len(), 3);
    }

    #[test]
    fn test_stochastic_policy_mixes() {
        let mut mdp = TabularMdp::new(0.0).unwrap();
        mdp.add_transition(0u8, 'a', 0, 1.0, 2.0)
            .add_transition(0u8, 'b', 0, 1.0, 6.0);
        let mut policy = TabularPolicy::new();
        policy.set_distribution(0u8, vec![('a', 0.25), ('b', 0.75)]);
        let vf = compute_value_function(&mdp, &policy, 1, AccuracyConfig::default()).unwrap();
        assert_eq!(vf.get(&0).unwrap().buckets(), &[(2.0, 0.25), (6.0, 0.75)]);
    }

    #[test]
    fn test_missing_policy_entry_is_unresolved() {
        let (mdp, _) = chain();
        let partial = TabularPolicy::deterministic([(0u8, 'n')]);
        let err = compute_value_function(&mdp, &partial, 1, AccuracyConfig::default()).unwrap_err();
        assert!(matches!(err, RiskError::UnresolvedReference(_)));
    }

    #[test]
    fn test_unknown_action_is_unresolved() {
        let (mdp, _) = chain();
        let policy = TabularPolicy::deterministic([(0u8, 'n'), (1, 'n'), (2, 'z')]);
        let err = compute_value_function(&mdp, &policy, 1, AccuracyConfig::default()).unwrap_err();
        assert!(matches!(err, RiskError::UnresolvedReference(_)));
    }

    #[test]
    fn test_bad_action_probabilities_rejected() {
        let (mdp, _) = chain();
        let mut policy = TabularPolicy::deterministic([(0u8, 'n'), (1, 'n'), (2, 'n')]);
        policy.set_distribution(1, vec![('n', 0.5)]);
        let err = compute_value_function(&mdp, &policy, 2, AccuracyConfig::default()).unwrap_err();
        assert!(matches!(err, RiskError::InvalidArgument(_)));
    }

    #[test]
    fn test_value_function_rejects_unknown_state() {
        let (mdp, policy) = chain();
        let vf = compute_value_function(&mdp, &policy, 1, AccuracyConfig::default()).unwrap();
        assert!(matches!(
            vf.get(&9).unwrap_err(),
            RiskError::UnresolvedReference(_)
        ));
    }
}
