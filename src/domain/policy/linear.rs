use super::{ActionCounts, BanditPolicy, PendingBatch, PolicyParams, argmax, uniform_action};
use crate::domain::linalg::{cholesky, sherman_morrison_update};
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Per-action ridge regression state shared by the linear policies.
#[derive(Debug, Clone)]
struct LinearArms {
    dim: usize,
    lambda: f64,
    batch_size: usize,
    a_inv: Vec<Array2<f64>>,
    b: Vec<Array1<f64>>,
    theta: Vec<Array1<f64>>,
    counts: ActionCounts,
    pending: PendingBatch,
}

impl LinearArms {
    fn new(n_actions: usize, dim: usize, params: &PolicyParams) -> Self {
        Self {
            dim,
            lambda: params.lambda,
            batch_size: params.batch_size,
            a_inv: vec![Array2::eye(dim) / params.lambda; n_actions],
            b: vec![Array1::zeros(dim); n_actions],
            theta: vec![Array1::zeros(dim); n_actions],
            counts: ActionCounts::new(n_actions),
            pending: PendingBatch::new(n_actions),
        }
    }

    fn n_actions(&self) -> usize {
        self.theta.len()
    }

    fn reset(&mut self) {
        let n_actions = self.n_actions();
        self.a_inv = vec![Array2::eye(self.dim) / self.lambda; n_actions];
        self.b = vec![Array1::zeros(self.dim); n_actions];
        self.theta = vec![Array1::zeros(self.dim); n_actions];
        self.counts.reset();
        self.pending.clear();
    }

    fn update(&mut self, action: usize, reward: f64, context: ArrayView1<'_, f64>) {
        self.counts.record(action);
        self.pending.push(action, reward, context);
        if self.counts.total() % self.batch_size != 0 {
            return;
        }

        for a in 0..self.n_actions() {
            for (r, x) in self.pending.rewards[a].iter().zip(&self.pending.contexts[a]) {
                let x = ArrayView1::from(x.as_slice());
                sherman_morrison_update(&mut self.a_inv[a], x);
                self.b[a].scaled_add(*r, &x);
            }
            if !self.pending.rewards[a].is_empty() {
                self.theta[a] = self.a_inv[a].dot(&self.b[a]);
            }
        }
        self.pending.clear();
    }

    fn predict(&self, context: ArrayView1<'_, f64>) -> Vec<f64> {
        self.theta.iter().map(|t| t.dot(&context)).collect()
    }

    /// `sqrt(x^T A^-1 x)` per action.
    fn widths(&self, context: ArrayView1<'_, f64>) -> Vec<f64> {
        self.a_inv
            .iter()
            .map(|a_inv| context.dot(&a_inv.dot(&context)).max(0.0).sqrt())
            .collect()
    }
}

/// Linear epsilon-greedy.
pub struct LinEpsilonGreedy {
    arms: LinearArms,
    epsilon: f64,
    random_state: u64,
    rng: StdRng,
}

impl LinEpsilonGreedy {
    pub fn new(n_actions: usize, dim: usize, params: &PolicyParams, random_state: u64) -> Self {
        Self {
            arms: LinearArms::new(n_actions, dim, params),
            epsilon: params.epsilon,
            random_state,
            rng: StdRng::seed_from_u64(random_state),
        }
    }
}

impl BanditPolicy for LinEpsilonGreedy {
    fn policy_name(&self) -> String {
        format!("linear_egreedy_{}", self.epsilon)
    }

    fn n_actions(&self) -> usize {
        self.arms.n_actions()
    }

    fn initialize(&mut self) {
        self.arms.reset();
        self.rng = StdRng::seed_from_u64(self.random_state);
    }

    fn select_action(&mut self, context: ArrayView1<'_, f64>) -> usize {
        if self.arms.counts.warming_up() || self.rng.random::<f64>() < self.epsilon {
            return uniform_action(&mut self.rng, self.arms.n_actions());
        }
        argmax(&self.arms.predict(context))
    }

    fn update_params(&mut self, action: usize, reward: f64, context: ArrayView1<'_, f64>) {
        self.arms.update(action, reward, context);
    }
}

/// Linear Upper Confidence Bound (Li et al., 2010).
pub struct LinUcb {
    arms: LinearArms,
    epsilon: f64,
    random_state: u64,
    rng: StdRng,
}

impl LinUcb {
    pub fn new(n_actions: usize, dim: usize, params: &PolicyParams, random_state: u64) -> Self {
        Self {
            arms: LinearArms::new(n_actions, dim, params),
            epsilon: params.epsilon,
            random_state,
            rng: StdRng::seed_from_u64(random_state),
        }
    }
}

impl BanditPolicy for LinUcb {
    fn policy_name(&self) -> String {
        format!("linear_ucb_{}", self.epsilon)
    }

    fn n_actions(&self) -> usize {
        self.arms.n_actions()
    }

    fn initialize(&mut self) {
        self.arms.reset();
        self.rng = StdRng::seed_from_u64(self.random_state);
    }

    fn select_action(&mut self, context: ArrayView1<'_, f64>) -> usize {
        if self.arms.counts.warming_up() {
            return uniform_action(&mut self.rng, self.arms.n_actions());
        }
        let scores: Vec<f64> = self
            .arms
            .predict(context)
            .into_iter()
            .zip(self.arms.widths(context))
            .map(|(mean, width)| mean + self.epsilon * width)
            .collect();
        argmax(&scores)
    }

    fn update_params(&mut self, action: usize, reward: f64, context: ArrayView1<'_, f64>) {
        self.arms.update(action, reward, context);
    }
}

/// Linear Thompson Sampling: `theta ~ N(A^-1 b, alpha^2 A^-1)` per action.
pub struct LinTs {
    arms: LinearArms,
    alpha: f64,
    random_state: u64,
    rng: StdRng,
}

impl LinTs {
    pub fn new(n_actions: usize, dim: usize, params: &PolicyParams, random_state: u64) -> Self {
        Self {
            arms: LinearArms::new(n_actions, dim, params),
            alpha: params.alpha,
            random_state,
            rng: StdRng::seed_from_u64(random_state),
        }
    }

    fn sample_score(&mut self, action: usize, context: ArrayView1<'_, f64>) -> f64 {
        let mean = self.arms.theta[action].dot(&context);
        let Ok(l) = cholesky(&self.arms.a_inv[action]) else {
            return mean;
        };
        let z = Array1::from_shape_simple_fn(self.arms.dim, || {
            self.rng.sample::<f64, _>(StandardNormal)
        });
        let noise = l.dot(&z);
        mean + self.alpha * noise.dot(&context)
    }
}

impl BanditPolicy for LinTs {
    fn policy_name(&self) -> String {
        "linear_ts".to_string()
    }

    fn n_actions(&self) -> usize {
        self.arms.n_actions()
    }

    fn initialize(&mut self) {
        self.arms.reset();
        self.rng = StdRng::seed_from_u64(self.random_state);
    }

    fn select_action(&mut self, context: ArrayView1<'_, f64>) -> usize {
        if self.arms.counts.warming_up() {
            return uniform_action(&mut self.rng, self.arms.n_actions());
        }
        let scores: Vec<f64> = (0..self.n_actions())
            .map(|a| self.sample_score(a, context))
            .collect();
        argmax(&scores)
    }

    fn update_params(&mut self, action: usize, reward: f64, context: ArrayView1<'_, f64>) {
        self.arms.update(action, reward, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Action 1 pays off when x[0] > 0, action 0 otherwise.
    fn train(policy: &mut dyn BanditPolicy) {
        for i in 0..400 {
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            let ctx = array![sign, 1.0];
            let good = if sign > 0.0 { 1 } else { 0 };
            policy.update_params(good, 1.0, ctx.view());
            policy.update_params(1 - good, 0.0, ctx.view());
        }
    }

    #[test]
    fn test_linucb_learns_context_dependence() {
        let params = PolicyParams {
            epsilon: 0.0,
            ..PolicyParams::default()
        };
        let mut policy = LinUcb::new(2, 2, &params, 0);
        train(&mut policy);
        assert_eq!(policy.select_action(array![1.0, 1.0].view()), 1);
        assert_eq!(policy.select_action(array![-1.0, 1.0].view()), 0);
    }

    #[test]
    fn test_lints_learns_context_dependence() {
        let params = PolicyParams {
            alpha: 0.01,
            ..PolicyParams::default()
        };
        let mut policy = LinTs::new(2, 2, &params, 0);
        train(&mut policy);
        assert_eq!(policy.select_action(array![1.0, 1.0].view()), 1);
        assert_eq!(policy.select_action(array![-1.0, 1.0].view()), 0);
    }

    #[test]
    fn test_egreedy_explores_during_warmup_and_resets() {
        let params = PolicyParams {
            epsilon: 0.0,
            ..PolicyParams::default()
        };
        let mut policy = LinEpsilonGreedy::new(3, 2, &params, 5);
        let ctx = array![0.5, 0.5];
        policy.update_params(0, 1.0, ctx.view());
        assert!(policy.arms.counts.warming_up());
        policy.update_params(1, 0.0, ctx.view());
        policy.update_params(2, 0.0, ctx.view());
        assert!(!policy.arms.counts.warming_up());
        assert_eq!(policy.select_action(ctx.view()), 0);

        policy.initialize();
        assert!(policy.arms.counts.warming_up());
        assert!(policy.arms.theta.iter().all(|t| t.iter().all(|v| *v == 0.0)));
    }

    #[test]
    fn test_batch_updates_defer_refit() {
        let params = PolicyParams {
            batch_size: 3,
            ..PolicyParams::default()
        };
        let mut arms = LinearArms::new(2, 1, &params);
        let ctx = array![1.0];
        arms.update(0, 1.0, ctx.view());
        arms.update(0, 1.0, ctx.view());
        assert_eq!(arms.theta[0][0], 0.0);
        arms.update(1, 0.0, ctx.view());
        // A = 1 + 2, b = 2
        assert!((arms.theta[0][0] - 2.0 / 3.0).abs() < 1e-12);
    }
}
