use crate::domain::errors::{OpeError, OpeResult};
use ndarray::{Array2, ArrayView1};

/// Counterfactual action distribution: one probability row per round.
pub type ActionDist = Array2<f64>;

/// Logged bandit feedback collected under a behavior policy.
#[derive(Debug, Clone)]
pub struct BanditFeedback {
    pub n_rounds: usize,
    pub n_actions: usize,
    /// `(n_rounds, dim_context)`
    pub context: Array2<f64>,
    /// `(n_actions, dim_action_context)`
    pub action_context: Array2<f64>,
    pub action: Vec<usize>,
    pub reward: Vec<f64>,
    /// Behavior probability of the logged action.
    pub pscore: Vec<f64>,
    /// `(n_rounds, n_actions)`; only known for synthetic data.
    pub expected_reward: Option<Array2<f64>>,
}

impl BanditFeedback {
    pub fn dim_context(&self) -> usize {
        self.context.ncols()
    }

    pub fn dim_action_context(&self) -> usize {
        self.action_context.ncols()
    }

    pub fn context_row(&self, round: usize) -> ArrayView1<'_, f64> {
        self.context.row(round)
    }

    /// Empirical mean of the observed rewards, i.e. the on-policy value of the
    /// behavior policy.
    pub fn mean_reward(&self) -> f64 {
        if self.reward.is_empty() {
            return 0.0;
        }
        self.reward.iter().sum::<f64>() / self.reward.len() as f64
    }

    pub fn validate(&self) -> OpeResult<()> {
        if self.n_rounds == 0 {
            return Err(OpeError::EmptyFeedback);
        }
        if self.n_actions == 0 {
            return Err(OpeError::invalid("n_actions", "must be positive"));
        }
        if self.context.nrows() != self.n_rounds {
            return Err(OpeError::shape(
                "context rows",
                self.n_rounds,
                self.context.nrows(),
            ));
        }
        if self.action_context.nrows() != self.n_actions {
            return Err(OpeError::shape(
                "action_context rows",
                self.n_actions,
                self.action_context.nrows(),
            ));
        }
        for (what, len) in [
            ("action", self.action.len()),
            ("reward", self.reward.len()),
            ("pscore", self.pscore.len()),
        ] {
            if len != self.n_rounds {
                return Err(OpeError::shape(what, self.n_rounds, len));
            }
        }
        if let Some(expected) = &self.expected_reward
            && expected.dim() != (self.n_rounds, self.n_actions)
        {
            return Err(OpeError::shape(
                "expected_reward",
                format!("({}, {})", self.n_rounds, self.n_actions),
                format!("{:?}", expected.dim()),
            ));
        }
        validate_actions(&self.action, self.n_actions)?;
        validate_pscore(&self.pscore)?;
        Ok(())
    }
}

pub(crate) fn validate_actions(action: &[usize], n_actions: usize) -> OpeResult<()> {
    match action.iter().enumerate().find(|(_, a)| **a >= n_actions) {
        Some((index, &action)) => Err(OpeError::ActionOutOfRange {
            index,
            action,
            n_actions,
        }),
        None => Ok(()),
    }
}

pub(crate) fn validate_pscore(pscore: &[f64]) -> OpeResult<()> {
    match pscore
        .iter()
        .enumerate()
        .find(|(_, p)| !(p.is_finite() && **p > 0.0 && **p <= 1.0))
    {
        Some((index, &value)) => Err(OpeError::InvalidPropensity { index, value }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_feedback() -> BanditFeedback {
        BanditFeedback {
            n_rounds: 3,
            n_actions: 2,
            context: array![[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]],
            action_context: array![[1.0, 0.0], [0.0, 1.0]],
            action: vec![0, 1, 1],
            reward: vec![1.0, 0.0, 1.0],
            pscore: vec![0.5, 0.5, 0.5],
            expected_reward: None,
        }
    }

    #[test]
    fn test_validate_accepts_consistent_feedback() {
        let feedback = small_feedback();
        assert!(feedback.validate().is_ok());
        assert!((feedback.mean_reward() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_out_of_range_action() {
        let mut feedback = small_feedback();
        feedback.action[2] = 5;
        assert!(matches!(
            feedback.validate(),
            Err(OpeError::ActionOutOfRange { index: 2, action: 5, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_pscore() {
        let mut feedback = small_feedback();
        feedback.pscore[1] = 0.0;
        assert!(matches!(
            feedback.validate(),
            Err(OpeError::InvalidPropensity { index: 1, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_length_mismatch() {
        let mut feedback = small_feedback();
        feedback.reward.pop();
        assert!(matches!(
            feedback.validate(),
            Err(OpeError::ShapeMismatch { what: "reward", .. })
        ));
    }
}
