//! Backward-induction checks against hand-computed and expected-value results.

use cvar_policy::tabular::{TabularMdp, TabularPolicy};
use cvar_policy::{
    compute_value_function, AccuracyConfig, Mdp, Policy, RewardDistribution, RiskError,
};

/// Four states with stochastic transitions and two actions each.
fn four_state_mdp() -> TabularMdp<u8, char> {
    let mut mdp = TabularMdp::new(0.9).unwrap();
    for s in 0..4u8 {
        let right = (s + 1) % 4;
        let left = (s + 3) % 4;
        mdp.add_transition(s, 'r', right, 0.7, s as f64)
            .add_transition(s, 'r', left, 0.3, -1.0)
            .add_transition(s, 'l', left, 0.5, 2.0)
            .add_transition(s, 'l', s, 0.25, 0.0)
            .add_transition(s, 'l', right, 0.25, 5.0);
    }
    mdp.set_terminal_reward(3, 10.0);
    mdp.validate(&AccuracyConfig::default()).unwrap();
    mdp
}

fn mixed_policy() -> TabularPolicy<u8, char> {
    let mut policy = TabularPolicy::new();
    policy
        .set_action(0, 'r')
        .set_action(1, 'l')
        .set_distribution(2, vec![('r', 0.4), ('l', 0.6)])
        .set_distribution(3, vec![('r', 0.5), ('l', 0.5)]);
    policy
}

/// Classic expected-value policy evaluation, for comparison with the means.
fn expected_values(
    mdp: &TabularMdp<u8, char>,
    policy: &TabularPolicy<u8, char>,
    horizon: usize,
) -> Vec<f64> {
    let mut values: Vec<f64> = (0..4u8).map(|s| mdp.terminal_reward(&s)).collect();
    for _ in 0..horizon {
        values = (0..4u8)
            .map(|s| {
                policy
                    .actions_at(&s)
                    .unwrap()
                    .iter()
                    .map(|(a, pa)| {
                        pa * mdp
                            .transitions(&s, a)
                            .unwrap()
                            .iter()
                            .map(|t| {
                                let r = match t.reward {
                                    cvar_policy::RewardContribution::Scalar(r) => r,
                                    _ => unreachable!(),
                                };
                                t.probability
                                    * (r + mdp.discount_factor() * values[t.next_state as usize])
                            })
                            .sum::<f64>()
                    })
                    .sum()
            })
            .collect();
    }
    values
}

#[test]
fn means_match_expected_value_evaluation() {
    let mdp = four_state_mdp();
    let policy = mixed_policy();
    let accuracy = AccuracyConfig::new(40, 0.0001).unwrap();
    let vf = compute_value_function(&mdp, &policy, 12, accuracy).unwrap();
    let expected = expected_values(&mdp, &policy, 12);

    for s in 0..4u8 {
        let mean = vf.get(&s).unwrap().average_reward();
        assert!(
            (mean - expected[s as usize]).abs() < 1e-6,
            "state {s}: distribution mean {mean}, expected value {}",
            expected[s as usize]
        );
    }
}

#[test]
fn every_distribution_respects_accuracy_bounds() {
    let mdp = four_state_mdp();
    let policy = mixed_policy();
    for granularity in [1, 5, 25, 200] {
        let accuracy = AccuracyConfig::new(granularity, 0.0001).unwrap();
        let vf = compute_value_function(&mdp, &policy, 8, accuracy).unwrap();
        assert_eq!(vf.len(), 4);
        for (s, dist) in vf.iter() {
            assert!(dist.len() <= granularity, "state {s}: {} buckets", dist.len());
            assert!((dist.total_mass() - 1.0).abs() <= accuracy.epsilon);
            assert!(dist.check_invariants().is_ok());
        }
    }
}

#[test]
fn distributional_rewards_convolve_with_continuation() {
    let accuracy = AccuracyConfig::default();
    let coin = RewardDistribution::from_buckets([(0.0, 0.5), (1.0, 0.5)], accuracy).unwrap();
    let mut mdp = TabularMdp::new(0.5).unwrap();
    mdp.add_transition(0u8, 'f', 0, 1.0, coin);
    let policy = TabularPolicy::deterministic([(0u8, 'f')]);

    let vf = compute_value_function(&mdp, &policy, 2, accuracy).unwrap();
    assert_eq!(
        vf.get(&0).unwrap().buckets(),
        &[(0.0, 0.25), (0.5, 0.25), (1.0, 0.25), (1.5, 0.25)]
    );
}

#[test]
fn terminal_rewards_are_discounted_into_the_origin() {
    let mut mdp = TabularMdp::new(0.5).unwrap();
    mdp.add_state(1u8);
    mdp.add_transition(0u8, 'g', 1, 1.0, 2.0)
        .add_transition(1u8, 'g', 1, 1.0, 0.0)
        .set_terminal_reward(1, 8.0);
    let policy = TabularPolicy::deterministic([(0u8, 'g'), (1, 'g')]);

    let vf = compute_value_function(&mdp, &policy, 1, AccuracyConfig::default()).unwrap();
    assert_eq!(vf.get(&0).unwrap().buckets(), &[(6.0, 1.0)]);
    assert_eq!(vf.get(&1).unwrap().buckets(), &[(4.0, 1.0)]);
}

#[test]
fn undeclared_successor_aborts_the_computation() {
    let mut mdp = TabularMdp::new(0.5).unwrap();
    mdp.add_transition(0u8, 'g', 0, 0.5, 1.0)
        .add_transition(0u8, 'g', 42, 0.5, 1.0);
    let policy = TabularPolicy::deterministic([(0u8, 'g')]);
    let err = compute_value_function(&mdp, &policy, 1, AccuracyConfig::default()).unwrap_err();
    assert!(matches!(err, RiskError::UnresolvedReference(_)));
}

#[test]
fn malformed_transition_row_is_rejected() {
    let mut mdp = TabularMdp::new(0.5).unwrap();
    mdp.add_transition(0u8, 'g', 0, 0.7, 1.0)
        .add_transition(0u8, 'g', 0, 0.7, 2.0);
    let policy = TabularPolicy::deterministic([(0u8, 'g')]);
    let err = compute_value_function(&mdp, &policy, 1, AccuracyConfig::default()).unwrap_err();
    assert!(matches!(err, RiskError::InvalidArgument(_)));
}

#[test]
fn validation_and_induction_share_the_row_tolerance() {
    let mut mdp = TabularMdp::new(0.5).unwrap();
    mdp.add_transition(0u8, 'g', 0, 0.5, 1.0)
        .add_transition(0u8, 'g', 0, 0.50005, 2.0);
    let policy = TabularPolicy::deterministic([(0u8, 'g')]);

    let loose = AccuracyConfig::default();
    assert!(mdp.validate(&loose).is_ok());
    assert!(compute_value_function(&mdp, &policy, 1, loose).is_ok());

    let tight = AccuracyConfig::new(200, 1e-6).unwrap();
    assert!(mdp.validate(&tight).is_err());
    let err = compute_value_function(&mdp, &policy, 1, tight).unwrap_err();
    assert!(matches!(err, RiskError::InvalidArgument(_)));
}

#[test]
fn invalid_accuracy_is_rejected_before_any_work() {
    let mdp = four_state_mdp();
    let policy = mixed_policy();
    let bad = AccuracyConfig {
        granularity: 0,
        epsilon: 0.01,
    };
    let err = compute_value_function(&mdp, &policy, 3, bad).unwrap_err();
    assert!(matches!(err, RiskError::InvalidArgument(_)));
}

#[test]
fn repeated_computation_is_deterministic() {
    let mdp = four_state_mdp();
    let policy = mixed_policy();
    let accuracy = AccuracyConfig::new(30, 0.0001).unwrap();
    let a = compute_value_function(&mdp, &policy, 10, accuracy).unwrap();
    let b = compute_value_function(&mdp, &policy, 10, accuracy).unwrap();
    for s in 0..4u8 {
        assert_eq!(a.get(&s).unwrap(), b.get(&s).unwrap());
    }
}

#[test]
fn accuracy_config_loads_from_json_with_defaults() {
    let config: AccuracyConfig = serde_json::from_str(r#"{"granularity": 50}"#).unwrap();
    assert_eq!(config.granularity, 50);
    assert_eq!(config.epsilon, 0.0001);
    assert!(config.validate().is_ok());

    let bad: AccuracyConfig = serde_json::from_str(r#"{"epsilon": 2.0}"#).unwrap();
    assert!(bad.validate().is_err());
}
