use super::{ActionCounts, BanditPolicy, PendingBatch, PolicyParams, argmax, uniform_action};
use crate::domain::stats::sigmoid;
use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

const MAX_NEWTON_STEPS: usize = 20;

/// Online logistic regression with a diagonal Laplace posterior
/// (Chapelle & Li, 2011). `m` is the posterior mode, `q` the per-coordinate
/// precision.
#[derive(Debug, Clone)]
pub struct MiniBatchLogisticRegression {
    pub lambda: f64,
    pub alpha: f64,
    pub dim: usize,
    m: Array1<f64>,
    q: Array1<f64>,
}

impl MiniBatchLogisticRegression {
    pub fn new(lambda: f64, alpha: f64, dim: usize) -> Self {
        Self {
            lambda,
            alpha,
            dim,
            m: Array1::zeros(dim),
            q: Array1::from_elem(dim, lambda),
        }
    }

    pub fn mode(&self) -> &Array1<f64> {
        &self.m
    }

    pub fn precision(&self) -> &Array1<f64> {
        &self.q
    }

    /// Fit on one mini-batch of `(context, reward)` pairs. Rewards in `{0, 1}`
    /// are mapped to labels `{-1, +1}`. The previous posterior acts as the
    /// prior.
    pub fn fit(&mut self, xs: &[Vec<f64>], rewards: &[f64]) {
        if xs.is_empty() {
            return;
        }
        let labels: Vec<f64> = rewards
            .iter()
            .map(|r| if *r > 0.5 { 1.0 } else { -1.0 })
            .collect();

        let mut w = self.m.clone();
        for _ in 0..MAX_NEWTON_STEPS {
            let mut grad = &self.q * &(&w - &self.m);
            let mut hess = self.q.clone();
            for (x, y) in xs.iter().zip(&labels) {
                let x = ArrayView1::from(x.as_slice());
                let margin = y * w.dot(&x);
                // d/dw log(1 + exp(-y w.x)) = -y x sigmoid(-y w.x)
                grad.scaled_add(-y * sigmoid(-margin), &x);
                let p = sigmoid(w.dot(&x));
                hess.scaled_add(p * (1.0 - p), &x.mapv(|v| v * v));
            }
            let step = &grad / &hess;
            w -= &step;
            if step.iter().map(|s| s.abs()).fold(0.0, f64::max) < 1e-8 {
                break;
            }
        }
        self.m = w;

        for x in xs {
            let x = ArrayView1::from(x.as_slice());
            let p = sigmoid(x.dot(&self.m));
            self.q.scaled_add(p * (1.0 - p), &x.mapv(|v| v * v));
        }
    }

    /// Posterior standard deviation per coordinate, scaled by `alpha`.
    pub fn sd(&self) -> Array1<f64> {
        self.q.mapv(|q| self.alpha / q.sqrt())
    }

    pub fn predict_proba(&self, x: ArrayView1<'_, f64>) -> f64 {
        sigmoid(x.dot(&self.m))
    }

    pub fn predict_proba_with_sampling(&self, x: ArrayView1<'_, f64>, rng: &mut StdRng) -> f64 {
        let sd = self.sd();
        let w: Array1<f64> = self
            .m
            .iter()
            .zip(sd.iter())
            .map(|(m, s)| m + s * rng.sample::<f64, _>(StandardNormal))
            .collect();
        sigmoid(x.dot(&w))
    }

    /// `sqrt(sum x^2 / q)`: the width term used by the UCB variant.
    pub fn uncertainty(&self, x: ArrayView1<'_, f64>) -> f64 {
        x.iter()
            .zip(self.q.iter())
            .map(|(v, q)| v * v / q)
            .sum::<f64>()
            .sqrt()
    }
}

/// Per-action logistic models plus mini-batch bookkeeping.
#[derive(Debug, Clone)]
struct LogisticArms {
    models: Vec<MiniBatchLogisticRegression>,
    batch_size: usize,
    counts: ActionCounts,
    pending: PendingBatch,
}

impl LogisticArms {
    fn new(n_actions: usize, dim: usize, params: &PolicyParams) -> Self {
        Self {
            models: (0..n_actions)
                .map(|_| MiniBatchLogisticRegression::new(params.lambda, params.alpha, dim))
                .collect(),
            batch_size: params.batch_size,
            counts: ActionCounts::new(n_actions),
            pending: PendingBatch::new(n_actions),
        }
    }

    fn n_actions(&self) -> usize {
        self.models.len()
    }

    fn reset(&mut self) {
        for model in &mut self.models {
            *model = MiniBatchLogisticRegression::new(model.lambda, model.alpha, model.dim);
        }
        self.counts.reset();
        self.pending.clear();
    }

    fn update(&mut self, action: usize, reward: f64, context: ArrayView1<'_, f64>) {
        self.counts.record(action);
        self.pending.push(action, reward, context);
        if self.counts.total() % self.batch_size != 0 {
            return;
        }
        for (a, model) in self.models.iter_mut().enumerate() {
            if !self.pending.rewards[a].is_empty() {
                model.fit(&self.pending.contexts[a], &self.pending.rewards[a]);
            }
        }
        self.pending.clear();
    }

    fn predict(&self, context: ArrayView1<'_, f64>) -> Vec<f64> {
        self.models.iter().map(|m| m.predict_proba(context)).collect()
    }
}

/// Logistic epsilon-greedy.
pub struct LogisticEpsilonGreedy {
    arms: LogisticArms,
    epsilon: f64,
    random_state: u64,
    rng: StdRng,
}

impl LogisticEpsilonGreedy {
    pub fn new(n_actions: usize, dim: usize, params: &PolicyParams, random_state: u64) -> Self {
        Self {
            arms: LogisticArms::new(n_actions, dim, params),
            epsilon: params.epsilon,
            random_state,
            rng: StdRng::seed_from_u64(random_state),
        }
    }
}

impl BanditPolicy for LogisticEpsilonGreedy {
    fn policy_name(&self) -> String {
        format!("logistic_egreedy_{}", self.epsilon)
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

/// Logistic Upper Confidence Bound.
pub struct LogisticUcb {
    arms: LogisticArms,
    epsilon: f64,
    random_state: u64,
    rng: StdRng,
}

impl LogisticUcb {
    pub fn new(n_actions: usize, dim: usize, params: &PolicyParams, random_state: u64) -> Self {
        Self {
            arms: LogisticArms::new(n_actions, dim, params),
            epsilon: params.epsilon,
            random_state,
            rng: StdRng::seed_from_u64(random_state),
        }
    }
}

impl BanditPolicy for LogisticUcb {
    fn policy_name(&self) -> String {
        format!("logistic_ucb_{}", self.epsilon)
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
            .models
            .iter()
            .map(|m| m.predict_proba(context) + self.epsilon * m.uncertainty(context))
            .collect();
        argmax(&scores)
    }

    fn update_params(&mut self, action: usize, reward: f64, context: ArrayView1<'_, f64>) {
        self.arms.update(action, reward, context);
    }
}

/// Logistic Thompson Sampling.
pub struct LogisticTs {
    arms: LogisticArms,
    random_state: u64,
    rng: StdRng,
}

impl LogisticTs {
    pub fn new(n_actions: usize, dim: usize, params: &PolicyParams, random_state: u64) -> Self {
        Self {
            arms: LogisticArms::new(n_actions, dim, params),
            random_state,
            rng: StdRng::seed_from_u64(random_state),
        }
    }
}

impl BanditPolicy for LogisticTs {
    fn policy_name(&self) -> String {
        "logistic_ts".to_string()
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
        let rng = &mut self.rng;
        let scores: Vec<f64> = self
            .arms
            .models
            .iter()
            .map(|m| m.predict_proba_with_sampling(context, rng))
            .collect();
        argmax(&scores)
    }

    fn update_params(&mut self, action: usize, reward: f64, context: ArrayView1<'_, f64>) {
        self.arms.update(action, reward, context);
    }
}
