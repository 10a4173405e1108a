//! Estimator configuration parsing from environment variables.
//!
//! Covers the bootstrap used for confidence intervals and the Switch-DR
//! threshold.

use super::parse_env;
use crate::domain::estimators::EstimatorParams;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Estimator environment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorEnvConfig {
    /// Significance level; intervals are `1 - alpha` wide.
    pub alpha: f64,
    pub n_bootstrap_samples: usize,
    pub switch_tau: f64,
}

impl Default for EstimatorEnvConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            n_bootstrap_samples: 10_000,
            switch_tau: EstimatorParams::default().switch_tau,
        }
    }
}

impl EstimatorEnvConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            alpha: parse_env("OPE_ALPHA", defaults.alpha)?,
            n_bootstrap_samples: parse_env("OPE_N_BOOTSTRAP_SAMPLES", defaults.n_bootstrap_samples)?,
            switch_tau: parse_env("OPE_SWITCH_TAU", defaults.switch_tau)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            bail!("alpha must be in (0, 1), got {}", self.alpha);
        }
        if self.n_bootstrap_samples == 0 {
            bail!("n_bootstrap_samples must be positive");
        }
        if self.switch_tau.is_nan() || self.switch_tau < 0.0 {
            bail!("switch_tau must be non-negative, got {}", self.switch_tau);
        }
        Ok(())
    }

    pub fn estimator_params(&self) -> EstimatorParams {
        EstimatorParams {
            switch_tau: self.switch_tau,
        }
    }

    /// Interval label, e.g. `95.0%` for `alpha = 0.05`.
    pub fn confidence_label(&self) -> String {
        format!("{:.1}%", 100.0 * (1.0 - self.alpha))
    }
}
