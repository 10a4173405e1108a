use crate::domain::errors::{OpeError, OpeResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution};

/// Sample mean with a percentile bootstrap interval around it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Softmax over a slice of logits, shifted by the max for stability.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Quantile via sorting + linear interpolation. Empty input returns `NaN`.
pub fn quantile_linear(data: &[f64], q: f64) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    if sorted.len() == 1 {
        return sorted[0];
    }

    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let i = pos.floor() as usize;
    let j = pos.ceil() as usize;
    if i == j {
        return sorted[i];
    }
    let t = pos - i as f64;
    (1.0 - t) * sorted[i] + t * sorted[j]
}

/// Mean and sample standard deviation (statrs boundary). A single sample has
/// zero spread.
pub fn mean_and_std(samples: &[f64]) -> Option<(f64, f64)> {
    if samples.is_empty() {
        return None;
    }
    let data = Data::new(samples.to_vec());
    let mean = data.mean()?;
    let std_dev = if samples.len() > 1 { data.std_dev()? } else { 0.0 };
    Some((mean, std_dev))
}

/// Percentile bootstrap confidence interval of the mean.
///
/// Resamples `samples` with replacement `n_bootstrap_samples` times and takes
/// the `alpha / 2` and `1 - alpha / 2` quantiles of the resampled means. The
/// reported `mean` is the plain sample mean. Deterministic for a given
/// `random_state`.
pub fn estimate_confidence_interval_by_bootstrap(
    samples: &[f64],
    alpha: f64,
    n_bootstrap_samples: usize,
    random_state: u64,
) -> OpeResult<ConfidenceInterval> {
    if samples.is_empty() {
        return Err(OpeError::invalid("samples", "must not be empty"));
    }
    if !(alpha.is_finite() && alpha > 0.0 && alpha < 1.0) {
        return Err(OpeError::invalid(
            "alpha",
            format!("must be in (0, 1), got {alpha}"),
        ));
    }
    if n_bootstrap_samples == 0 {
        return Err(OpeError::invalid("n_bootstrap_samples", "must be positive"));
    }

    let n = samples.len();
    let mut rng = StdRng::seed_from_u64(random_state);
    let boot_means: Vec<f64> = (0..n_bootstrap_samples)
        .map(|_| {
            let total: f64 = (0..n).map(|_| samples[rng.random_range(0..n)]).sum();
            total / n as f64
        })
        .collect();

    let mean = samples.iter().sum::<f64>() / n as f64;
    Ok(ConfidenceInterval {
        mean,
        lower: quantile_linear(&boot_means, alpha / 2.0),
        upper: quantile_linear(&boot_means, 1.0 - alpha / 2.0),
    })
}
