use super::{EstimatorInput, EstimatorKind, OffPolicyEstimator, self_normalizer};
use crate::domain::errors::{OpeError, OpeResult};

/// `q_hat(x_i, pi) + c_i (r_i - q_hat(x_i, a_i))` for per-round correction
/// weights `c_i`.
fn corrected_rounds(
    input: &EstimatorInput<'_>,
    name: &str,
    correction: impl Fn(f64) -> f64,
) -> OpeResult<Vec<f64>> {
    input.validate()?;
    let estimated = input.require_estimated_rewards(name)?;
    let baseline = input.policy_baseline(estimated);
    let logged = input.logged_baseline(estimated);
    Ok(input
        .importance_weights()
        .into_iter()
        .zip(input.reward)
        .zip(baseline.into_iter().zip(logged))
        .map(|((w, r), (q_pi, q_logged))| q_pi + correction(w) * (r - q_logged))
        .collect())
}

/// Doubly Robust (Dudík et al., 2011).
#[derive(Debug, Clone, Copy, Default)]
pub struct DoublyRobust;

impl OffPolicyEstimator for DoublyRobust {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Dr
    }

    fn estimate_round_rewards(&self, input: &EstimatorInput<'_>) -> OpeResult<Vec<f64>> {
        corrected_rounds(input, self.name(), |w| w)
    }
}

/// Doubly Robust with self-normalized weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfNormalizedDoublyRobust;

impl OffPolicyEstimator for SelfNormalizedDoublyRobust {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Sndr
    }

    fn estimate_round_rewards(&self, input: &EstimatorInput<'_>) -> OpeResult<Vec<f64>> {
        input.validate()?;
        let scale = self_normalizer(&input.importance_weights());
        corrected_rounds(input, self.name(), |w| w * scale)
    }
}

/// Switch Doubly Robust (Wang et al., 2016): the IPW correction is kept only
/// for rounds whose weight is at most `tau`.
#[derive(Debug, Clone, Copy)]
pub struct SwitchDoublyRobust {
    tau: f64,
}

impl SwitchDoublyRobust {
    pub fn new(tau: f64) -> OpeResult<Self> {
        if tau.is_nan() || tau < 0.0 {
            return Err(OpeError::invalid(
                "switch_tau",
                format!("must be non-negative, got {tau}"),
            ));
        }
        Ok(Self { tau })
    }
}

impl OffPolicyEstimator for SwitchDoublyRobust {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::SwitchDr
    }

    fn estimate_round_rewards(&self, input: &EstimatorInput<'_>) -> OpeResult<Vec<f64>> {
        let tau = self.tau;
        corrected_rounds(input, self.name(), |w| if w <= tau { w } else { 0.0 })
    }
}
