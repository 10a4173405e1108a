use super::{ActionCounts, BanditPolicy, PolicyParams, argmax, uniform_action};
use ndarray::ArrayView1;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Beta, Distribution};

/// Uniformly random policy.
pub struct Random {
    n_actions: usize,
    random_state: u64,
    rng: StdRng,
}

impl Random {
    pub fn new(n_actions: usize, random_state: u64) -> Self {
        Self {
            n_actions,
            random_state,
            rng: StdRng::seed_from_u64(random_state),
        }
    }
}

impl BanditPolicy for Random {
    fn policy_name(&self) -> String {
        "random".to_string()
    }

    fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn initialize(&mut self) {
        self.rng = StdRng::seed_from_u64(self.random_state);
    }

    fn select_action(&mut self, _context: ArrayView1<'_, f64>) -> usize {
        uniform_action(&mut self.rng, self.n_actions)
    }

    fn update_params(&mut self, _action: usize, _reward: f64, _context: ArrayView1<'_, f64>) {}
}

/// Bernoulli Thompson Sampling with a Beta(alpha, beta) prior per action.
/// Ignores the context.
pub struct BernoulliTs {
    n_actions: usize,
    prior_alpha: f64,
    prior_beta: f64,
    successes: Vec<f64>,
    failures: Vec<f64>,
    counts: ActionCounts,
    random_state: u64,
    rng: StdRng,
}

impl BernoulliTs {
    pub fn new(n_actions: usize, params: &PolicyParams, random_state: u64) -> Self {
        Self {
            n_actions,
            prior_alpha: params.alpha,
            prior_beta: params.alpha,
            successes: vec![0.0; n_actions],
            failures: vec![0.0; n_actions],
            counts: ActionCounts::new(n_actions),
            random_state,
            rng: StdRng::seed_from_u64(random_state),
        }
    }

    /// Posterior mean reward of each action.
    pub fn posterior_means(&self) -> Vec<f64> {
        (0..self.n_actions)
            .map(|a| {
                let a_post = self.prior_alpha + self.successes[a];
                let b_post = self.prior_beta + self.failures[a];
                a_post / (a_post + b_post)
            })
            .collect()
    }
}

impl BanditPolicy for BernoulliTs {
    fn policy_name(&self) -> String {
        "bts".to_string()
    }

    fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn initialize(&mut self) {
        self.successes.iter_mut().for_each(|s| *s = 0.0);
        self.failures.iter_mut().for_each(|f| *f = 0.0);
        self.counts.reset();
        self.rng = StdRng::seed_from_u64(self.random_state);
    }

    fn select_action(&mut self, _context: ArrayView1<'_, f64>) -> usize {
        if self.counts.warming_up() {
            return uniform_action(&mut self.rng, self.n_actions);
        }
        let means = self.posterior_means();
        let samples: Vec<f64> = (0..self.n_actions)
            .map(|a| {
                let a_post = self.prior_alpha + self.successes[a];
                let b_post = self.prior_beta + self.failures[a];
                match Beta::new(a_post, b_post) {
                    Ok(dist) => dist.sample(&mut self.rng),
                    Err(_) => means[a],
                }
            })
            .collect();
        argmax(&samples)
    }

    fn update_params(&mut self, action: usize, reward: f64, _context: ArrayView1<'_, f64>) {
        self.counts.record(action);
        let r = reward.clamp(0.0, 1.0);
        self.successes[action] += r;
        self.failures[action] += 1.0 - r;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_random_is_reproducible_after_initialize() {
        let ctx = array![0.0];
        let mut policy = Random::new(5, 9);
        let first: Vec<usize> = (0..20).map(|_| policy.select_action(ctx.view())).collect();
        policy.initialize();
        let second: Vec<usize> = (0..20).map(|_| policy.select_action(ctx.view())).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|a| *a < 5));
    }

    #[test]
    fn test_bts_concentrates_on_best_arm() {
        let ctx = array![0.0];
        let mut policy = BernoulliTs::new(2, &PolicyParams::default(), 4);
        for _ in 0..200 {
            policy.update_params(0, 0.0, ctx.view());
            policy.update_params(1, 1.0, ctx.view());
        }
        let picks_best = (0..100)
            .filter(|_| policy.select_action(ctx.view()) == 1)
            .count();
        assert!(picks_best > 95);
        let means = policy.posterior_means();
        assert!(means[1] > 0.9 && means[0] < 0.1);
    }
}
