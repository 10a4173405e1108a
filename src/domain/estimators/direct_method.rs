use super::{EstimatorInput, EstimatorKind, OffPolicyEstimator};
use crate::domain::errors::OpeResult;

/// Direct Method: plug the regression model into the counterfactual policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectMethod;

impl OffPolicyEstimator for DirectMethod {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Dm
    }

    fn estimate_round_rewards(&self, input: &EstimatorInput<'_>) -> OpeResult<Vec<f64>> {
        input.validate()?;
        let estimated = input.require_estimated_rewards(self.name())?;
        Ok(input.policy_baseline(estimated))
    }
}
