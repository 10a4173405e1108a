//! Off-policy estimators of a counterfactual policy's value.
//!
//! Every estimator reduces the logged data to one value per round; the policy
//! value is their mean and the interval is a bootstrap over them.

mod direct_method;
mod doubly_robust;
mod ipw;

pub use direct_method::DirectMethod;
pub use doubly_robust::{DoublyRobust, SelfNormalizedDoublyRobust, SwitchDoublyRobust};
pub use ipw::{InverseProbabilityWeighting, SelfNormalizedInverseProbabilityWeighting};

use crate::domain::errors::{OpeError, OpeResult};
use crate::domain::feedback::{ActionDist, validate_actions, validate_pscore};
use crate::domain::stats::{ConfidenceInterval, estimate_confidence_interval_by_bootstrap};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Borrowed view of everything an estimator may need.
#[derive(Debug, Clone, Copy)]
pub struct EstimatorInput<'a> {
    pub reward: &'a [f64],
    pub action: &'a [usize],
    pub pscore: &'a [f64],
    pub action_dist: &'a ActionDist,
    /// Regression predictions `q_hat(x_i, a)` for every round and action.
    pub estimated_rewards: Option<&'a Array2<f64>>,
}

impl EstimatorInput<'_> {
    pub fn n_rounds(&self) -> usize {
        self.reward.len()
    }

    pub fn validate(&self) -> OpeResult<()> {
        let n = self.reward.len();
        if n == 0 {
            return Err(OpeError::EmptyFeedback);
        }
        if self.action.len() != n {
            return Err(OpeError::shape("action", n, self.action.len()));
        }
        if self.pscore.len() != n {
            return Err(OpeError::shape("pscore", n, self.pscore.len()));
        }
        if self.action_dist.nrows() != n {
            return Err(OpeError::shape("action_dist rows", n, self.action_dist.nrows()));
        }
        if let Some(est) = self.estimated_rewards
            && est.dim() != self.action_dist.dim()
        {
            return Err(OpeError::shape(
                "estimated_rewards",
                format!("{:?}", self.action_dist.dim()),
                format!("{:?}", est.dim()),
            ));
        }
        validate_actions(self.action, self.action_dist.ncols())?;
        validate_pscore(self.pscore)
    }

    /// `w_i = pi(a_i | x_i) / pscore_i`.
    pub fn importance_weights(&self) -> Vec<f64> {
        self.action
            .iter()
            .zip(self.pscore)
            .enumerate()
            .map(|(i, (a, p))| self.action_dist[[i, *a]] / p)
            .collect()
    }

    fn require_estimated_rewards(&self, estimator: &str) -> OpeResult<&Array2<f64>> {
        self.estimated_rewards
            .ok_or_else(|| OpeError::MissingEstimatedRewards {
                estimator: estimator.to_string(),
            })
    }

    /// `q_hat(x_i, pi) = sum_a pi(a | x_i) q_hat(x_i, a)`.
    fn policy_baseline(&self, estimated: &Array2<f64>) -> Vec<f64> {
        (estimated * self.action_dist)
            .rows()
            .into_iter()
            .map(|row| row.sum())
            .collect()
    }

    /// `q_hat(x_i, a_i)` for the logged action.
    fn logged_baseline(&self, estimated: &Array2<f64>) -> Vec<f64> {
        self.action
            .iter()
            .enumerate()
            .map(|(i, a)| estimated[[i, *a]])
            .collect()
    }
}

pub trait OffPolicyEstimator: Send + Sync {
    fn kind(&self) -> EstimatorKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Round-wise contributions whose mean is the policy value estimate.
    fn estimate_round_rewards(&self, input: &EstimatorInput<'_>) -> OpeResult<Vec<f64>>;

    fn estimate_policy_value(&self, input: &EstimatorInput<'_>) -> OpeResult<f64> {
        let rounds = self.estimate_round_rewards(input)?;
        Ok(rounds.iter().sum::<f64>() / rounds.len() as f64)
    }

    fn estimate_interval(
        &self,
        input: &EstimatorInput<'_>,
        alpha: f64,
        n_bootstrap_samples: usize,
        random_state: u64,
    ) -> OpeResult<ConfidenceInterval> {
        let rounds = self.estimate_round_rewards(input)?;
        estimate_confidence_interval_by_bootstrap(&rounds, alpha, n_bootstrap_samples, random_state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EstimatorKind {
    #[serde(rename = "dm")]
    Dm,
    #[serde(rename = "ipw")]
    Ipw,
    #[serde(rename = "snipw")]
    Snipw,
    #[serde(rename = "dr")]
    Dr,
    #[serde(rename = "sndr")]
    Sndr,
    #[serde(rename = "switch-dr")]
    SwitchDr,
}

impl EstimatorKind {
    pub const ALL: [EstimatorKind; 6] = [
        EstimatorKind::Dm,
        EstimatorKind::Ipw,
        EstimatorKind::Snipw,
        EstimatorKind::Dr,
        EstimatorKind::Sndr,
        EstimatorKind::SwitchDr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EstimatorKind::Dm => "dm",
            EstimatorKind::Ipw => "ipw",
            EstimatorKind::Snipw => "snipw",
            EstimatorKind::Dr => "dr",
            EstimatorKind::Sndr => "sndr",
            EstimatorKind::SwitchDr => "switch-dr",
        }
    }

    pub fn needs_regression(&self) -> bool {
        !matches!(self, EstimatorKind::Ipw | EstimatorKind::Snipw)
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EstimatorKind {
    type Err = OpeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EstimatorKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s.to_lowercase())
            .ok_or_else(|| OpeError::UnknownEstimator(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatorParams {
    /// Weight threshold above which Switch-DR drops the IPW correction.
    pub switch_tau: f64,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self { switch_tau: 1.0 }
    }
}

pub struct EstimatorFactory;

impl EstimatorFactory {
    pub fn create(
        kind: EstimatorKind,
        params: &EstimatorParams,
    ) -> OpeResult<Box<dyn OffPolicyEstimator>> {
        let estimator: Box<dyn OffPolicyEstimator> = match kind {
            EstimatorKind::Dm => Box::new(DirectMethod),
            EstimatorKind::Ipw => Box::new(InverseProbabilityWeighting),
            EstimatorKind::Snipw => Box::new(SelfNormalizedInverseProbabilityWeighting),
            EstimatorKind::Dr => Box::new(DoublyRobust),
            EstimatorKind::Sndr => Box::new(SelfNormalizedDoublyRobust),
            EstimatorKind::SwitchDr => Box::new(SwitchDoublyRobust::new(params.switch_tau)?),
        };
        Ok(estimator)
    }

    pub fn create_all(
        kinds: &[EstimatorKind],
        params: &EstimatorParams,
    ) -> OpeResult<Vec<Box<dyn OffPolicyEstimator>>> {
        kinds.iter().map(|k| Self::create(*k, params)).collect()
    }
}

/// `1 / mean(w)`, or zero when every weight is zero.
pub(crate) fn self_normalizer(weights: &[f64]) -> f64 {
    let mean = weights.iter().sum::<f64>() / weights.len() as f64;
    if mean > 0.0 { 1.0 / mean } else { 0.0 }
}


#[cfg(test)]
mod tests {
    use super::fixtures::Fixture;
    use super::*;

    #[test]
    fn test_importance_weights() {
        let f = Fixture::new();
        assert_eq!(f.input().importance_weights(), vec![2.0, 0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_validate_rejects_bad_estimated_rewards_shape() {
        let f = Fixture::new();
        let wrong = ndarray::Array2::zeros((4, 3));
        let input = EstimatorInput {
            estimated_rewards: Some(&wrong),
            ..f.input()
        };
        assert!(matches!(
            input.validate(),
            Err(OpeError::ShapeMismatch { what: "estimated_rewards", .. })
        ));
    }

    #[test]
    fn test_estimator_kind_names() {
        let names: Vec<&str> = EstimatorKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["dm", "ipw", "snipw", "dr", "sndr", "switch-dr"]);
        assert_eq!("switch-dr".parse::<EstimatorKind>().unwrap(), EstimatorKind::SwitchDr);
        assert!("switch-ipw".parse::<EstimatorKind>().is_err());
    }

    #[test]
    fn test_factory_creates_in_order() {
        let estimators =
            EstimatorFactory::create_all(&EstimatorKind::ALL, &EstimatorParams::default()).unwrap();
        let names: Vec<&str> = estimators.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["dm", "ipw", "snipw", "dr", "sndr", "switch-dr"]);
    }

    #[test]
    fn test_interval_brackets_value() {
        let f = Fixture::new();
        let ipw = InverseProbabilityWeighting;
        let value = ipw.estimate_policy_value(&f.input()).unwrap();
        let ci = ipw.estimate_interval(&f.input(), 0.05, 200, 1).unwrap();
        assert!((ci.mean - value).abs() < 1e-12);
        assert!(ci.lower <= value && value <= ci.upper);
    }
}
