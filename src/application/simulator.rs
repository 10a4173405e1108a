use crate::domain::errors::{OpeError, OpeResult};
use crate::domain::feedback::{ActionDist, BanditFeedback};
use crate::domain::policy::BanditPolicy;
use ndarray::Array2;
use tracing::debug;

/// Replay a bandit policy over logged feedback.
///
/// The policy picks an action every round; it learns from the logged reward
/// only when its pick matches the logged action. Returns the policy's pick for
/// each round.
pub fn run_bandit_simulation(
    feedback: &BanditFeedback,
    policy: &mut dyn BanditPolicy,
) -> OpeResult<Vec<usize>> {
    feedback.validate()?;
    if policy.n_actions() != feedback.n_actions {
        return Err(OpeError::shape(
            "policy actions",
            feedback.n_actions,
            policy.n_actions(),
        ));
    }

    policy.initialize();
    let mut selected = Vec::with_capacity(feedback.n_rounds);
    let mut matched = 0usize;

    for round in 0..feedback.n_rounds {
        let context = feedback.context_row(round);
        let action = policy.select_action(context);
        if action == feedback.action[round] {
            policy.update_params(action, feedback.reward[round], context);
            matched += 1;
        }
        selected.push(action);
    }

    debug!(
        "Replay of {}: {} / {} rounds matched the logged action",
        policy.policy_name(),
        matched,
        feedback.n_rounds
    );
    Ok(selected)
}

/// One-hot action distribution from the selected actions.
pub fn convert_to_action_dist(n_actions: usize, selected_actions: &[usize]) -> OpeResult<ActionDist> {
    let mut dist = Array2::zeros((selected_actions.len(), n_actions));
    for (i, &a) in selected_actions.iter().enumerate() {
        if a >= n_actions {
            return Err(OpeError::ActionOutOfRange {
                index: i,
                action: a,
                n_actions,
            });
        }
        dist[[i, a]] = 1.0;
    }
    Ok(dist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, ArrayView1, array};

    /// Always picks action 1 and records what it was taught.
    struct Recorder {
        updates: Vec<(usize, f64)>,
        initialized: bool,
    }

    impl BanditPolicy for Recorder {
        fn policy_name(&self) -> String {
            "recorder".to_string()
        }
        fn n_actions(&self) -> usize {
            2
        }
        fn initialize(&mut self) {
            self.initialized = true;
        }
        fn select_action(&mut self, _context: ArrayView1<'_, f64>) -> usize {
            1
        }
        fn update_params(&mut self, action: usize, reward: f64, _context: ArrayView1<'_, f64>) {
            self.updates.push((action, reward));
        }
    }

    fn feedback() -> BanditFeedback {
        BanditFeedback {
            n_rounds: 4,
            n_actions: 2,
            context: Array2::zeros((4, 1)),
            action_context: Array2::eye(2),
            action: vec![0, 1, 1, 0],
            reward: vec![1.0, 0.0, 1.0, 1.0],
            pscore: vec![0.5; 4],
            expected_reward: None,
        }
    }

    #[test]
    fn test_replay_updates_only_on_match() {
        let mut policy = Recorder {
            updates: Vec::new(),
            initialized: false,
        };
        let selected = run_bandit_simulation(&feedback(), &mut policy).unwrap();
        assert!(policy.initialized);
        assert_eq!(selected, vec![1, 1, 1, 1]);
        assert_eq!(policy.updates, vec![(1, 0.0), (1, 1.0)]);
    }

    #[test]
    fn test_replay_rejects_action_count_mismatch() {
        let mut fb = feedback();
        fb.n_actions = 3;
        fb.action_context = Array2::eye(3);
        let mut policy = Recorder {
            updates: Vec::new(),
            initialized: false,
        };
        assert!(run_bandit_simulation(&fb, &mut policy).is_err());
    }

    #[test]
    fn test_convert_to_action_dist() {
        let dist = convert_to_action_dist(3, &[2, 0]).unwrap();
        assert_eq!(dist, array![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0]]);
        assert!(convert_to_action_dist(2, &[2]).is_err());
    }
}
