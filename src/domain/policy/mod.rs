//! Bandit policies replayed as counterfactual policies.

mod contextfree;
mod linear;
mod logistic;

pub use contextfree::{BernoulliTs, Random};
pub use linear::{LinEpsilonGreedy, LinTs, LinUcb};
pub use logistic::{LogisticEpsilonGreedy, LogisticTs, LogisticUcb, MiniBatchLogisticRegression};

use crate::domain::errors::{OpeError, OpeResult};
use ndarray::ArrayView1;
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A bandit algorithm that picks one action per round and learns online.
pub trait BanditPolicy: Send {
    fn policy_name(&self) -> String;
    fn n_actions(&self) -> usize;
    /// Reset learned parameters and the random stream.
    fn initialize(&mut self);
    fn select_action(&mut self, context: ArrayView1<'_, f64>) -> usize;
    fn update_params(&mut self, action: usize, reward: f64, context: ArrayView1<'_, f64>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Bts,
    Random,
    LinearTs,
    LinearUcb,
    LinearEgreedy,
    LogisticTs,
    LogisticUcb,
    LogisticEgreedy,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 8] = [
        PolicyKind::Bts,
        PolicyKind::Random,
        PolicyKind::LinearTs,
        PolicyKind::LinearUcb,
        PolicyKind::LinearEgreedy,
        PolicyKind::LogisticTs,
        PolicyKind::LogisticUcb,
        PolicyKind::LogisticEgreedy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Bts => "bts",
            PolicyKind::Random => "random",
            PolicyKind::LinearTs => "linear_ts",
            PolicyKind::LinearUcb => "linear_ucb",
            PolicyKind::LinearEgreedy => "linear_egreedy",
            PolicyKind::LogisticTs => "logistic_ts",
            PolicyKind::LogisticUcb => "logistic_ucb",
            PolicyKind::LogisticEgreedy => "logistic_egreedy",
        }
    }

    pub fn is_logistic(&self) -> bool {
        matches!(
            self,
            PolicyKind::LogisticTs | PolicyKind::LogisticUcb | PolicyKind::LogisticEgreedy
        )
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = OpeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = PolicyKind::ALL.iter().map(|k| k.as_str()).collect();
                OpeError::UnknownPolicy(format!("{s} (expected one of: {})", valid.join(", ")))
            })
    }
}

/// Hyperparameters shared by the policy family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyParams {
    /// Exploration rate for egreedy, width multiplier for UCB. Must be in [0, 1].
    pub epsilon: f64,
    /// Posterior scale for Thompson sampling.
    pub alpha: f64,
    /// Ridge / prior precision.
    pub lambda: f64,
    /// Number of updates buffered before parameters are refit.
    pub batch_size: usize,
}

impl Default for PolicyParams {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            alpha: 1.0,
            lambda: 1.0,
            batch_size: 1,
        }
    }
}

impl PolicyParams {
    pub fn validate(&self) -> OpeResult<()> {
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(OpeError::invalid(
                "epsilon",
                format!("must be in [0, 1], but {} is set", self.epsilon),
            ));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(OpeError::invalid("alpha", "must be positive"));
        }
        if !(self.lambda.is_finite() && self.lambda > 0.0) {
            return Err(OpeError::invalid("lambda", "must be positive"));
        }
        if self.batch_size == 0 {
            return Err(OpeError::invalid("batch_size", "must be at least 1"));
        }
        Ok(())
    }
}

pub struct PolicyFactory;

impl PolicyFactory {
    pub fn create(
        kind: PolicyKind,
        n_actions: usize,
        dim: usize,
        params: &PolicyParams,
        random_state: u64,
    ) -> OpeResult<Box<dyn BanditPolicy>> {
        params.validate()?;
        if n_actions == 0 {
            return Err(OpeError::invalid("n_actions", "must be positive"));
        }
        if dim == 0 && !matches!(kind, PolicyKind::Bts | PolicyKind::Random) {
            return Err(OpeError::invalid("dim", "must be positive"));
        }

        let policy: Box<dyn BanditPolicy> = match kind {
            PolicyKind::Random => Box::new(Random::new(n_actions, random_state)),
            PolicyKind::Bts => Box::new(BernoulliTs::new(n_actions, params, random_state)),
            PolicyKind::LinearEgreedy => {
                Box::new(LinEpsilonGreedy::new(n_actions, dim, params, random_state))
            }
            PolicyKind::LinearUcb => Box::new(LinUcb::new(n_actions, dim, params, random_state)),
            PolicyKind::LinearTs => Box::new(LinTs::new(n_actions, dim, params, random_state)),
            PolicyKind::LogisticEgreedy => Box::new(LogisticEpsilonGreedy::new(
                n_actions,
                dim,
                params,
                random_state,
            )),
            PolicyKind::LogisticUcb => {
                Box::new(LogisticUcb::new(n_actions, dim, params, random_state))
            }
            PolicyKind::LogisticTs => Box::new(LogisticTs::new(n_actions, dim, params, random_state)),
        };
        Ok(policy)
    }
}

/// Per-action update counts; policies explore uniformly until every action
/// has been observed at least once.
#[derive(Debug, Clone)]
pub(crate) struct ActionCounts {
    counts: Vec<usize>,
}

impl ActionCounts {
    pub(crate) fn new(n_actions: usize) -> Self {
        Self {
            counts: vec![0; n_actions],
        }
    }

    pub(crate) fn record(&mut self, action: usize) {
        self.counts[action] += 1;
    }

    pub(crate) fn warming_up(&self) -> bool {
        self.counts.iter().any(|c| *c == 0)
    }

    pub(crate) fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub(crate) fn reset(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
    }
}

/// Buffered `(action, reward, context)` updates applied every `batch_size` trials.
#[derive(Debug, Clone)]
pub(crate) struct PendingBatch {
    pub(crate) rewards: Vec<Vec<f64>>,
    pub(crate) contexts: Vec<Vec<Vec<f64>>>,
}

impl PendingBatch {
    pub(crate) fn new(n_actions: usize) -> Self {
        Self {
            rewards: vec![Vec::new(); n_actions],
            contexts: vec![Vec::new(); n_actions],
        }
    }

    pub(crate) fn push(&mut self, action: usize, reward: f64, context: ArrayView1<'_, f64>) {
        self.rewards[action].push(reward);
        self.contexts[action].push(context.to_vec());
    }

    pub(crate) fn clear(&mut self) {
        self.rewards.iter_mut().for_each(Vec::clear);
        self.contexts.iter_mut().for_each(Vec::clear);
    }
}

/// Index of the largest score; ties go to the lowest index.
pub(crate) fn argmax(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, s) in scores.iter().enumerate() {
        if *s > scores[best] {
            best = i;
        }
    }
    best
}

pub(crate) fn uniform_action(rng: &mut StdRng, n_actions: usize) -> usize {
    rng.random_range(0..n_actions)
}
