//! Synthetic logged bandit feedback.
//!
//! Contexts and action contexts are standard normal; expected rewards come
//! from a fixed random reward function and logged actions from a fixed random
//! behavior policy, so the ground-truth value of any action distribution is
//! known exactly.

use crate::domain::errors::{OpeError, OpeResult};
use crate::domain::feedback::{ActionDist, BanditFeedback};
use crate::domain::stats::{sigmoid, softmax};
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardFunction {
    #[default]
    Logistic,
    Linear,
}

impl FromStr for RewardFunction {
    type Err = OpeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logistic" => Ok(RewardFunction::Logistic),
            "linear" => Ok(RewardFunction::Linear),
            _ => Err(OpeError::invalid(
                "reward_function",
                format!("{s} (must be 'logistic' or 'linear')"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorPolicy {
    #[default]
    Linear,
    Uniform,
}

impl FromStr for BehaviorPolicy {
    type Err = OpeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(BehaviorPolicy::Linear),
            "uniform" | "random" => Ok(BehaviorPolicy::Uniform),
            _ => Err(OpeError::invalid(
                "behavior_policy",
                format!("{s} (must be 'linear' or 'uniform')"),
            )),
        }
    }
}

pub struct SyntheticBanditDataset {
    pub n_actions: usize,
    pub dim_context: usize,
    pub dim_action_context: usize,
    pub reward_function: RewardFunction,
    pub behavior_policy: BehaviorPolicy,
    action_context: Array2<f64>,
    reward_coef_context: Array1<f64>,
    reward_coef_action: Array1<f64>,
    behavior_coef: Array2<f64>,
    rng: StdRng,
}

impl SyntheticBanditDataset {
    pub fn new(
        n_actions: usize,
        dim_context: usize,
        dim_action_context: usize,
        reward_function: RewardFunction,
        behavior_policy: BehaviorPolicy,
        random_state: u64,
    ) -> OpeResult<Self> {
        if n_actions == 0 {
            return Err(OpeError::invalid("n_actions", "must be positive"));
        }
        if dim_context == 0 {
            return Err(OpeError::invalid("dim_context", "must be positive"));
        }
        if dim_action_context == 0 {
            return Err(OpeError::invalid("dim_action_context", "must be positive"));
        }

        let mut rng = StdRng::seed_from_u64(random_state);
        let action_context =
            Array2::from_shape_simple_fn((n_actions, dim_action_context), || {
                rng.sample::<f64, _>(StandardNormal)
            });
        let reward_coef_context =
            Array1::from_shape_simple_fn(dim_context, || rng.random_range(-1.0..1.0));
        let reward_coef_action =
            Array1::from_shape_simple_fn(dim_action_context, || rng.random_range(-1.0..1.0));
        let behavior_coef = Array2::from_shape_simple_fn((dim_context, dim_action_context), || {
            rng.random_range(-1.0..1.0)
        });

        Ok(Self {
            n_actions,
            dim_context,
            dim_action_context,
            reward_function,
            behavior_policy,
            action_context,
            reward_coef_context,
            reward_coef_action,
            behavior_coef,
            rng,
        })
    }

    pub fn action_context(&self) -> &Array2<f64> {
        &self.action_context
    }

    /// Expected reward `q(x, a)` for every action at one context.
    pub fn expected_reward_row(&self, context: ArrayView1<'_, f64>) -> Vec<f64> {
        let base = context.dot(&self.reward_coef_context);
        self.action_context
            .rows()
            .into_iter()
            .map(|e| {
                let score = base + e.dot(&self.reward_coef_action);
                match self.reward_function {
                    RewardFunction::Logistic => sigmoid(score),
                    RewardFunction::Linear => (0.5 + 0.1 * score).clamp(0.0, 1.0),
                }
            })
            .collect()
    }

    /// Behavior policy action probabilities at one context.
    pub fn behavior_probs(&self, context: ArrayView1<'_, f64>) -> Vec<f64> {
        match self.behavior_policy {
            BehaviorPolicy::Uniform => vec![1.0 / self.n_actions as f64; self.n_actions],
            BehaviorPolicy::Linear => {
                let projected = context.dot(&self.behavior_coef);
                let logits: Vec<f64> = self
                    .action_context
                    .rows()
                    .into_iter()
                    .map(|e| projected.dot(&e))
                    .collect();
                softmax(&logits)
            }
        }
    }

    /// Draw `n_rounds` of logged feedback. Successive calls continue the same
    /// random stream, so a fresh dataset with the same seed replays them.
    pub fn obtain_batch_bandit_feedback(&mut self, n_rounds: usize) -> OpeResult<BanditFeedback> {
        if n_rounds == 0 {
            return Err(OpeError::invalid("n_rounds", "must be positive"));
        }

        let dim_context = self.dim_context;
        let rng = &mut self.rng;
        let context = Array2::from_shape_simple_fn((n_rounds, dim_context), || {
            rng.sample::<f64, _>(StandardNormal)
        });

        let mut expected_reward = Array2::zeros((n_rounds, self.n_actions));
        let mut action = Vec::with_capacity(n_rounds);
        let mut reward = Vec::with_capacity(n_rounds);
        let mut pscore = Vec::with_capacity(n_rounds);

        for (i, x) in context.rows().into_iter().enumerate() {
            let q = self.expected_reward_row(x);
            let probs = self.behavior_probs(x);
            let a = sample_index(&probs, self.rng.random::<f64>());
            let r = if self.rng.random::<f64>() < q[a] { 1.0 } else { 0.0 };

            for (j, value) in q.iter().enumerate() {
                expected_reward[[i, j]] = *value;
            }
            action.push(a);
            reward.push(r);
            pscore.push(probs[a]);
        }

        Ok(BanditFeedback {
            n_rounds,
            n_actions: self.n_actions,
            context,
            action_context: self.action_context.clone(),
            action,
            reward,
            pscore,
            expected_reward: Some(expected_reward),
        })
    }
}

/// Inverse-CDF draw from a discrete distribution given `u` in `[0, 1)`.
pub(crate) fn sample_index(probs: &[f64], u: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, p) in probs.iter().enumerate() {
        cumulative += p;
        if u < cumulative {
            return i;
        }
    }
    // Rounding can leave the total a hair under 1.
    probs.iter().rposition(|p| *p > 0.0).unwrap_or(0)
}

/// Value of an action distribution under the true expected rewards:
/// `mean_i sum_a pi(a | x_i) q(x_i, a)`.
pub fn calc_ground_truth_policy_value(
    expected_reward: &Array2<f64>,
    action_dist: &ActionDist,
) -> OpeResult<f64> {
    if expected_reward.dim() != action_dist.dim() {
        return Err(OpeError::shape(
            "action_dist",
            format!("{:?}", expected_reward.dim()),
            format!("{:?}", action_dist.dim()),
        ));
    }
    if expected_reward.nrows() == 0 {
        return Err(OpeError::EmptyFeedback);
    }
    let total: f64 = (expected_reward * action_dist).sum();
    Ok(total / expected_reward.nrows() as f64)
}
