use crate::domain::errors::{OpeError, OpeResult};
use crate::domain::estimators::{EstimatorInput, OffPolicyEstimator};
use serde::{Deserialize, Serialize};

/// Estimated value of the counterfactual policy by one estimator, with its
/// bootstrap interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyValueSummary {
    pub estimator: String,
    pub estimated_policy_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// Runs a fixed set of estimators over the same input.
pub struct OffPolicyEvaluation {
    estimators: Vec<Box<dyn OffPolicyEstimator>>,
}

impl OffPolicyEvaluation {
    pub fn new(estimators: Vec<Box<dyn OffPolicyEstimator>>) -> OpeResult<Self> {
        if estimators.is_empty() {
            return Err(OpeError::invalid("estimators", "at least one is required"));
        }
        Ok(Self { estimators })
    }

    pub fn estimator_names(&self) -> Vec<&'static str> {
        self.estimators.iter().map(|e| e.name()).collect()
    }

    pub fn estimate_policy_values(&self, input: &EstimatorInput<'_>) -> OpeResult<Vec<(String, f64)>> {
        self.estimators
            .iter()
            .map(|e| Ok((e.name().to_string(), e.estimate_policy_value(input)?)))
            .collect()
    }

    pub fn estimate_intervals(
        &self,
        input: &EstimatorInput<'_>,
        alpha: f64,
        n_bootstrap_samples: usize,
        random_state: u64,
    ) -> OpeResult<Vec<PolicyValueSummary>> {
        self.estimators
            .iter()
            .map(|e| {
                let ci = e.estimate_interval(input, alpha, n_bootstrap_samples, random_state)?;
                Ok(PolicyValueSummary {
                    estimator: e.name().to_string(),
                    estimated_policy_value: ci.mean,
                    ci_lower: ci.lower,
                    ci_upper: ci.upper,
                })
            })
            .collect()
    }

    /// Point estimates together with their intervals.
    pub fn summarize_off_policy_estimates(
        &self,
        input: &EstimatorInput<'_>,
        alpha: f64,
        n_bootstrap_samples: usize,
        random_state: u64,
    ) -> OpeResult<Vec<PolicyValueSummary>> {
        let values = self.estimate_policy_values(input)?;
        let mut summaries = self.estimate_intervals(input, alpha, n_bootstrap_samples, random_state)?;
        for (summary, (_, value)) in summaries.iter_mut().zip(values) {
            summary.estimated_policy_value = value;
        }
        Ok(summaries)
    }

    /// Relative estimation error `|V_hat - V| / V` of every estimator.
    pub fn evaluate_performance_of_estimators(
        &self,
        ground_truth_policy_value: f64,
        input: &EstimatorInput<'_>,
    ) -> OpeResult<Vec<(String, f64)>> {
        if ground_truth_policy_value == 0.0 {
            return Err(OpeError::ZeroGroundTruth);
        }
        Ok(self
            .estimate_policy_values(input)?
            .into_iter()
            .map(|(name, value)| {
                let error = (value - ground_truth_policy_value).abs() / ground_truth_policy_value.abs();
                (name, error)
            })
            .collect())
    }
}
