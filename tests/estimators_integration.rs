use ndarray::Array2;
use opebench::application::ope::OffPolicyEvaluation;
use opebench::application::regression::{RegressionModel, RegressionSettings};
use opebench::application::simulator::{convert_to_action_dist, run_bandit_simulation};
use opebench::domain::estimators::{
    DirectMethod, DoublyRobust, EstimatorInput, InverseProbabilityWeighting, OffPolicyEstimator,
    SelfNormalizedInverseProbabilityWeighting, SwitchDoublyRobust,
};
use opebench::domain::feedback::BanditFeedback;
use opebench::domain::policy::{PolicyFactory, PolicyKind, PolicyParams};
use opebench::domain::synthetic::{
    BehaviorPolicy, RewardFunction, SyntheticBanditDataset, calc_ground_truth_policy_value,
};

fn uniform_feedback(n_rounds: usize, seed: u64) -> BanditFeedback {
    SyntheticBanditDataset::new(
        3,
        2,
        2,
        RewardFunction::Logistic,
        BehaviorPolicy::Uniform,
        seed,
    )
    .unwrap()
    .obtain_batch_bandit_feedback(n_rounds)
    .unwrap()
}

fn always(action: usize, n_rounds: usize, n_actions: usize) -> Array2<f64> {
    convert_to_action_dist(n_actions, &vec![action; n_rounds]).unwrap()
}

#[test]
fn test_ipw_is_close_to_ground_truth_under_uniform_logging() {
    let feedback = uniform_feedback(20_000, 2024);
    let action_dist = always(0, feedback.n_rounds, feedback.n_actions);
    let truth =
        calc_ground_truth_policy_value(feedback.expected_reward.as_ref().unwrap(), &action_dist)
            .unwrap();

    let input = EstimatorInput {
        reward: &feedback.reward,
        action: &feedback.action,
        pscore: &feedback.pscore,
        action_dist: &action_dist,
        estimated_rewards: None,
    };
    let ipw = InverseProbabilityWeighting.estimate_policy_value(&input).unwrap();
    let snipw = SelfNormalizedInverseProbabilityWeighting
        .estimate_policy_value(&input)
        .unwrap();

    assert!((ipw - truth).abs() < 0.05, "ipw={ipw}, truth={truth}");
    assert!((snipw - truth).abs() < 0.05, "snipw={snipw}, truth={truth}");
}

#[test]
fn test_doubly_robust_family_identities() {
    let feedback = uniform_feedback(2_000, 8);
    let action_dist = always(1, feedback.n_rounds, feedback.n_actions);

    // A reward model that is exact on the logged actions cancels the correction.
    let mut estimated = feedback.expected_reward.clone().unwrap();
    for (i, &a) in feedback.action.iter().enumerate() {
        estimated[[i, a]] = feedback.reward[i];
    }
    let input = EstimatorInput {
        reward: &feedback.reward,
        action: &feedback.action,
        pscore: &feedback.pscore,
        action_dist: &action_dist,
        estimated_rewards: Some(&estimated),
    };

    let dm = DirectMethod.estimate_policy_value(&input).unwrap();
    let dr = DoublyRobust.estimate_policy_value(&input).unwrap();
    assert!((dm - dr).abs() < 1e-12);

    let model = feedback.expected_reward.clone().unwrap();
    let input = EstimatorInput {
        estimated_rewards: Some(&model),
        ..input
    };
    let dm = DirectMethod.estimate_policy_value(&input).unwrap();
    let dr = DoublyRobust.estimate_policy_value(&input).unwrap();
    let switch_none = SwitchDoublyRobust::new(0.0)
        .unwrap()
        .estimate_policy_value(&input)
        .unwrap();
    let switch_all = SwitchDoublyRobust::new(1e9)
        .unwrap()
        .estimate_policy_value(&input)
        .unwrap();
    assert!((switch_none - dm).abs() < 1e-12);
    assert!((switch_all - dr).abs() < 1e-12);
}

#[test]
fn test_full_pipeline_on_replayed_policy() {
    let mut dataset = SyntheticBanditDataset::new(
        4,
        3,
        3,
        RewardFunction::Logistic,
        BehaviorPolicy::Linear,
        77,
    )
    .unwrap();
    let feedback = dataset.obtain_batch_bandit_feedback(1_500).unwrap();

    let mut policy = PolicyFactory::create(
        PolicyKind::LinearUcb,
        feedback.n_actions,
        feedback.dim_context(),
        &PolicyParams::default(),
        77,
    )
    .unwrap();
    let selected = run_bandit_simulation(&feedback, policy.as_mut()).unwrap();
    let action_dist = convert_to_action_dist(feedback.n_actions, &selected).unwrap();
    let truth =
        calc_ground_truth_policy_value(feedback.expected_reward.as_ref().unwrap(), &action_dist)
            .unwrap();

    let mut regression =
        RegressionModel::new(&RegressionSettings::default(), feedback.action_context.clone())
            .unwrap();
    let estimated = regression.fit_predict(&feedback).unwrap();
    assert!(estimated.iter().all(|q| (0.0..=1.0).contains(q)));

    let input = EstimatorInput {
        reward: &feedback.reward,
        action: &feedback.action,
        pscore: &feedback.pscore,
        action_dist: &action_dist,
        estimated_rewards: Some(&estimated),
    };
    let estimators: Vec<Box<dyn OffPolicyEstimator>> = vec![
        Box::new(DirectMethod),
        Box::new(InverseProbabilityWeighting),
        Box::new(DoublyRobust),
    ];
    let ope = OffPolicyEvaluation::new(estimators).unwrap();
    let errors = ope.evaluate_performance_of_estimators(truth, &input).unwrap();

    assert_eq!(errors.len(), 3);
    for (name, error) in errors {
        assert!(error.is_finite() && error >= 0.0, "{name}: {error}");
    }
}
