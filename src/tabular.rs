//! Table-backed MDP and policy.
//!
//! [`TabularMdp`] stores the kernel explicitly, keyed by `(state, action)`.
//! [`TabularPolicy`] stores one action distribution per state. Both are plain
//! data: build them once, then share them read-only with the value-function
//! engine and the comparator.

use std::collections::HashMap;

use crate::config::AccuracyConfig;
use crate::error::{Result, RiskError};
use crate::types::{Identity, Mdp, Policy, RewardContribution, Transition};

/// Finite MDP with an explicit transition table.
#[derive(Debug, Clone)]
pub struct TabularMdp<S, A> {
    states: Vec<S>,
    state_index: HashMap<S, usize>,
    actions: HashMap<S, Vec<A>>,
    kernel: HashMap<(S, A), Vec<Transition<S>>>,
    terminal_rewards: HashMap<S, f64>,
    discount: f64,
}

impl<S: Identity, A: Identity> TabularMdp<S, A> {
    /// Empty model with the given discount factor, which must lie in `[0, 1)`.
    pub fn new(discount: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&discount) {
            return Err(RiskError::invalid(format!(
                "discount factor must lie in [0, 1), got {discount}"
            )));
        }
        Ok(Self {
            states: Vec::new(),
            state_index: HashMap::new(),
            actions: HashMap::new(),
            kernel: HashMap::new(),
            terminal_rewards: HashMap::new(),
            discount,
        })
    }

    /// Declare a state. Declaring it again is a no-op.
    pub fn add_state(&mut self, state: S) -> &mut Self {
        if !self.state_index.contains_key(&state) {
            self.state_index.insert(state.clone(), self.states.len());
            self.states.push(state);
        }
        self
    }

    /// Add one outcome of `action` in `state`. `state` is declared implicitly;
    /// `next_state` is not, so a typo surfaces in [`TabularMdp::validate`]
    /// instead of silently growing the domain.
    pub fn add_transition(
        &mut self,
        state: S,
        action: A,
        next_state: S,
        probability: f64,
        reward: impl Into<RewardContribution>,
    ) -> &mut Self {
        self.add_state(state.clone());
        let known = self.actions.entry(state.clone()).or_default();
        if !known.contains(&action) {
            known.push(action.clone());
        }
        self.kernel
            .entry((state, action))
            .or_default()
            .push(Transition::new(next_state, probability, reward));
        self
    }

    pub fn set_terminal_reward(&mut self, state: S, reward: f64) -> &mut Self {
        self.add_state(state.clone());
        self.terminal_rewards.insert(state, reward);
        self
    }

    pub fn contains(&self, state: &S) -> bool {
        self.state_index.contains_key(state)
    }

    /// Actions with at least one outcome at `state`, in insertion order.
    pub fn actions(&self, state: &S) -> &[A] {
        self.actions.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check every declared `(state, action)` row: probabilities non-negative
    /// and summing to `1 ± accuracy.epsilon`, successors declared, rewards
    /// finite. Pass the config the model will be evaluated with.
    pub fn validate(&self, accuracy: &AccuracyConfig) -> Result<()> {
        for ((state, action), outcomes) in &self.kernel {
            let mut total = 0.0;
            for t in outcomes {
                if !(t.probability.is_finite() && t.probability >= 0.0) {
                    return Err(RiskError::invalid(format!(
                        "transition {state:?} --{action:?}--> {:?} has probability {}",
                        t.next_state, t.probability
                    )));
                }
                if !self.contains(&t.next_state) {
                    return Err(RiskError::unresolved(format!(
                        "transition {state:?} --{action:?}--> undeclared state {:?}",
                        t.next_state
                    )));
                }
                if let RewardContribution::Scalar(r) = t.reward {
                    if !r.is_finite() {
                        return Err(RiskError::invalid(format!(
                            "transition {state:?} --{action:?}--> {:?} has reward {r}",
                            t.next_state
                        )));
                    }
                }
                total += t.probability;
            }
            if (total - 1.0).abs() > accuracy.epsilon {
                return Err(RiskError::invalid(format!(
                    "outcomes of {action:?} at {state:?} sum to {total}"
                )));
            }
        }
        Ok(())
    }
}

impl<S: Identity, A: Identity> Mdp for TabularMdp<S, A> {
    type State = S;
    type Action = A;

    fn states(&self) -> &[S] {
        &self.states
    }

    fn transitions(&self, state: &S, action: &A) -> Option<Vec<Transition<S>>> {
        self.kernel.get(&(state.clone(), action.clone())).cloned()
    }

    fn discount_factor(&self) -> f64 {
        self.discount
    }

    fn terminal_reward(&self, state: &S) -> f64 {
        self.terminal_rewards.get(state).copied().unwrap_or(0.0)
    }
}

/// Policy stored as one action distribution per state.
#[derive(Debug, Clone)]
pub struct TabularPolicy<S, A> {
    choices: HashMap<S, Vec<(A, f64)>>,
}

impl<S: Identity, A: Identity> Default for TabularPolicy<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Identity, A: Identity> TabularPolicy<S, A> {
    pub fn new() -> Self {
        Self {
            choices: HashMap::new(),
        }
    }

    /// One fixed action per state.
    pub fn deterministic(assignments: impl IntoIterator<Item = (S, A)>) -> Self {
        let mut policy = Self::new();
        for (state, action) in assignments {
            policy.set_action(state, action);
        }
        policy
    }

    pub fn set_action(&mut self, state: S, action: A) -> &mut Self {
        self.choices.insert(state, vec![(action, 1.0)]);
        self
    }

    pub fn set_distribution(&mut self, state: S, actions: Vec<(A, f64)>) -> &mut Self {
        self.choices.insert(state, actions);
        self
    }

    /// Copy of this policy that plays `action` at `state`, unchanged elsewhere.
    /// This is the single-state perturbation a local search evaluates.
    pub fn with_action(&self, state: S, action: A) -> Self {
        let mut next = self.clone();
        next.set_action(state, action);
        next
    }

    pub fn choices_at(&self, state: &S) -> Option<&[(A, f64)]> {
        self.choices.get(state).map(Vec::as_slice)
    }
}

impl<S: Identity, A: Identity> Policy<S, A> for TabularPolicy<S, A> {
    fn actions_at(&self, state: &S) -> Option<Vec<(A, f64)>> {
        self.choices.get(state).cloned()
    }
}
