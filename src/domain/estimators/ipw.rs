use super::{EstimatorInput, EstimatorKind, OffPolicyEstimator, self_normalizer};
use crate::domain::errors::OpeResult;

/// Inverse Probability Weighting: `w_i r_i`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InverseProbabilityWeighting;

impl OffPolicyEstimator for InverseProbabilityWeighting {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Ipw
    }

    fn estimate_round_rewards(&self, input: &EstimatorInput<'_>) -> OpeResult<Vec<f64>> {
        input.validate()?;
        Ok(input
            .importance_weights()
            .iter()
            .zip(input.reward)
            .map(|(w, r)| w * r)
            .collect())
    }
}

/// Self-normalized IPW: weights rescaled to average one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfNormalizedInverseProbabilityWeighting;

impl OffPolicyEstimator for SelfNormalizedInverseProbabilityWeighting {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Snipw
    }

    fn estimate_round_rewards(&self, input: &EstimatorInput<'_>) -> OpeResult<Vec<f64>> {
        input.validate()?;
        let weights = input.importance_weights();
        let scale = self_normalizer(&weights);
        Ok(weights
            .iter()
            .zip(input.reward)
            .map(|(w, r)| w * scale * r)
            .collect())
    }
}
