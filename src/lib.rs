//! # cvar-policy: risk-sensitive policy comparison for finite MDPs
//!
//! Ranks candidate policies of a finite Markov Decision Process by their
//! **CVaR-skewed** cumulative reward: the most favourable `skewing_factor` of
//! each policy's reward distribution is discarded before the comparison, so a
//! policy cannot win on a thin tail of very high rewards alone.
//!
//! ## Pipeline
//!
//! | Step | Module | Description |
//! |------|--------|-------------|
//! | 1 | [`value_function`] | Backward induction over the horizon: exact (discretized) cumulative-reward distribution at every state for a fixed policy |
//! | 2 | [`distribution`] | Canonical bounded PMF with combination, CVaR tail cut and stochastic dominance |
//! | 3 | [`comparator`] | Skew the distributions at the origin and the studied state, then rank with a drift-tolerant tie break |
//!
//! The MDP and the policies are supplied by the caller through the traits in
//! [`types`]; [`tabular`] provides table-backed implementations. A policy
//! search driver owns the loop that perturbs policies and calls
//! [`comparator::PolicyRiskComparator::compare`], passing the perturbed state
//! each time.
//!
//! ## Accuracy
//!
//! Distributions are discretized under an [`config::AccuracyConfig`]:
//! at most `granularity` buckets (default 200), with buckets lighter than
//! `epsilon` or closer than `epsilon` in value merged (default 0.0001).
//! Merges keep the mean exact; tails are approximated to within the merged
//! bucket widths.
//!
//! ## Concurrency
//!
//! Everything is synchronous and deterministic. Within one horizon layer,
//! states are computed in parallel with rayon; layers run strictly in order.
//! The comparator holds no mutable state.

pub mod comparator;
pub mod config;
pub mod constants;
pub mod distribution;
pub mod error;
pub mod tabular;
pub mod types;
pub mod value_function;

pub use comparator::PolicyRiskComparator;
pub use config::AccuracyConfig;
pub use distribution::RewardDistribution;
pub use error::{Result, RiskError};
pub use types::{Mdp, Policy, RewardContribution, Transition};
pub use value_function::{compute_value_function, ValueFunction};
