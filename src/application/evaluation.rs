use crate::application::ope::OffPolicyEvaluation;
use crate::application::regression::RegressionModel;
use crate::application::simulator::{convert_to_action_dist, run_bandit_simulation};
use crate::config::Settings;
use crate::domain::errors::OpeError;
use crate::domain::estimators::{EstimatorFactory, EstimatorInput, EstimatorKind};
use crate::domain::policy::{PolicyFactory, PolicyKind};
use crate::domain::stats::{estimate_confidence_interval_by_bootstrap, mean_and_std};
use crate::domain::synthetic::{
    BehaviorPolicy, RewardFunction, SyntheticBanditDataset, calc_ground_truth_policy_value,
};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Shape of one benchmarking experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub n_runs: usize,
    pub n_rounds: usize,
    pub n_actions: usize,
    pub dim_context: usize,
    pub dim_action_context: usize,
    pub counterfactual_policy: PolicyKind,
    pub random_state: u64,
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<(), OpeError> {
        let counts = [
            ("n_runs", self.n_runs, 1),
            ("n_rounds", self.n_rounds, 1),
            ("n_actions", self.n_actions, 1),
            ("dim_context", self.dim_context, 1),
            ("dim_action_context", self.dim_action_context, 1),
        ];
        for (name, value, min) in counts {
            if value < min {
                return Err(OpeError::invalid(
                    name,
                    format!("must be at least {min}, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

/// Mean relative estimation error of one estimator with its interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorSummary {
    pub estimator: String,
    pub mean: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub random_state: u64,
    pub counterfactual_policy: String,
    pub n_runs: usize,
    pub rows: Vec<EstimatorSummary>,
}

/// Relative errors of every estimator in a single run.
#[derive(Debug, Clone)]
struct RunOutcome {
    ground_truth: f64,
    errors: Vec<(String, f64)>,
}

pub struct ExperimentRunner {
    config: ExperimentConfig,
    settings: Settings,
}

impl ExperimentRunner {
    pub fn new(config: ExperimentConfig, settings: Settings) -> Result<Self> {
        config.validate().context("Invalid experiment configuration")?;
        settings.estimators.validate()?;
        settings
            .policy
            .validate()
            .context("Invalid policy configuration")?;
        Ok(Self { config, settings })
    }

    /// Run every experiment and summarize relative errors per estimator.
    ///
    /// Runs are independent and execute on the rayon pool; results are
    /// collected in run order so the summary does not depend on scheduling.
    pub fn run(&self) -> Result<EvaluationSummary> {
        info!(
            "Evaluating {} estimators over {} runs of {} rounds (policy={}, random_state={})",
            EstimatorKind::ALL.len(),
            self.config.n_runs,
            self.config.n_rounds,
            self.config.counterfactual_policy,
            self.config.random_state
        );

        let outcomes: Vec<RunOutcome> = (0..self.config.n_runs)
            .into_par_iter()
            .map(|i| {
                self.run_single(i)
                    .with_context(|| format!("Run {} failed", i))
            })
            .collect::<Result<Vec<_>>>()?;

        self.summarize(&outcomes)
    }

    fn run_single(&self, run: usize) -> Result<RunOutcome> {
        let seed = self.config.random_state.wrapping_add(run as u64);

        let mut dataset = SyntheticBanditDataset::new(
            self.config.n_actions,
            self.config.dim_context,
            self.config.dim_action_context,
            RewardFunction::Logistic,
            BehaviorPolicy::Linear,
            seed,
        )?;
        let feedback = dataset.obtain_batch_bandit_feedback(self.config.n_rounds)?;

        let mut policy = PolicyFactory::create(
            self.config.counterfactual_policy,
            feedback.n_actions,
            feedback.dim_context(),
            &self.settings.policy,
            seed,
        )?;
        let selected = run_bandit_simulation(&feedback, policy.as_mut())?;
        let action_dist = convert_to_action_dist(feedback.n_actions, &selected)?;

        let expected_reward = feedback
            .expected_reward
            .as_ref()
            .ok_or_else(|| OpeError::invalid("expected_reward", "synthetic feedback lacks it"))?;
        let ground_truth = calc_ground_truth_policy_value(expected_reward, &action_dist)?;

        let mut regression =
            RegressionModel::new(&self.settings.regression, feedback.action_context.clone())?;
        let estimated_rewards = regression.fit_predict(&feedback)?;
        debug!("Run {}: fitted {} reward model", run, regression.base_name());

        let input = EstimatorInput {
            reward: &feedback.reward,
            action: &feedback.action,
            pscore: &feedback.pscore,
            action_dist: &action_dist,
            estimated_rewards: Some(&estimated_rewards),
        };
        let ope = OffPolicyEvaluation::new(EstimatorFactory::create_all(
            &EstimatorKind::ALL,
            &self.settings.estimators.estimator_params(),
        )?)?;
        let errors = ope.evaluate_performance_of_estimators(ground_truth, &input)?;

        debug!(
            "Run {} (seed {}): ground truth {:.4}, {}",
            run,
            seed,
            ground_truth,
            errors
                .iter()
                .map(|(name, e)| format!("{}={:.4}", name, e))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(RunOutcome {
            ground_truth,
            errors,
        })
    }

    fn summarize(&self, outcomes: &[RunOutcome]) -> Result<EvaluationSummary> {
        let mean_truth =
            outcomes.iter().map(|o| o.ground_truth).sum::<f64>() / outcomes.len() as f64;
        debug!("Mean ground-truth policy value: {:.4}", mean_truth);

        let mut rows = Vec::with_capacity(EstimatorKind::ALL.len());
        for (idx, kind) in EstimatorKind::ALL.iter().enumerate() {
            let errors: Vec<f64> = outcomes.iter().map(|o| o.errors[idx].1).collect();
            if let Some((mean, std)) = mean_and_std(&errors) {
                debug!("{}: relative error {:.4} +/- {:.4}", kind, mean, std);
            }
            let ci = estimate_confidence_interval_by_bootstrap(
                &errors,
                self.settings.estimators.alpha,
                self.settings.estimators.n_bootstrap_samples,
                self.config.random_state,
            )
            .with_context(|| format!("Failed to summarize {}", kind))?;
            rows.push(EstimatorSummary {
                estimator: kind.as_str().to_string(),
                mean: ci.mean,
                ci_lower: ci.lower,
                ci_upper: ci.upper,
            });
        }

        Ok(EvaluationSummary {
            random_state: self.config.random_state,
            counterfactual_policy: self.config.counterfactual_policy.to_string(),
            n_runs: self.config.n_runs,
            rows,
        })
    }
}
