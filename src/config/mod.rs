//! Configuration module for opebench.
//!
//! Settings are loaded from environment variables (optionally seeded from a
//! `.env` file), organized by concern: estimators, reward regression, and
//! counterfactual policies. A TOML settings file may override any of them.

mod estimator_config;
mod policy_config;
mod regression_config;

pub use estimator_config::EstimatorEnvConfig;
pub use policy_config::PolicyEnvConfig;
pub use regression_config::RegressionEnvConfig;

use crate::application::regression::{BaseModel, RegressionSettings};
use crate::domain::policy::PolicyParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

/// Parse `key` from the environment, falling back to `default` when unset.
pub(crate) fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .context(format!("Failed to parse {}", key)),
        Err(_) => Ok(default),
    }
}

/// Aggregated runtime settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub estimators: EstimatorEnvConfig,
    pub regression: RegressionSettings,
    pub policy: PolicyParams,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            estimators: EstimatorEnvConfig::from_env().context("Failed to load estimator config")?,
            regression: RegressionEnvConfig::from_env()
                .context("Failed to load regression config")?,
            policy: PolicyEnvConfig::from_env().context("Failed to load policy config")?,
        })
    }

    /// Environment settings, overridden by the TOML file at `path` if given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = Self::from_env()?;
        if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .context(format!("Failed to read settings file: {}", path.display()))?;
            settings
                .apply_toml(&content)
                .context(format!("Failed to parse settings TOML: {}", path.display()))?;
        }
        Ok(settings)
    }

    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let file: SettingsFile = toml::from_str(content)?;
        file.apply(self);
        self.estimators.validate()?;
        self.policy.validate()?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SettingsFile {
    estimators: EstimatorsSection,
    regression: RegressionSection,
    policy: PolicySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct EstimatorsSection {
    alpha: Option<f64>,
    n_bootstrap_samples: Option<usize>,
    switch_tau: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RegressionSection {
    base_model: Option<BaseModel>,
    lambda: Option<f64>,
    max_iter: Option<usize>,
    n_trees: Option<usize>,
    max_depth: Option<u16>,
    min_samples_split: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PolicySection {
    epsilon: Option<f64>,
    alpha: Option<f64>,
    lambda: Option<f64>,
    batch_size: Option<usize>,
}

fn overlay<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

impl SettingsFile {
    fn apply(self, settings: &mut Settings) {
        let est = &mut settings.estimators;
        overlay(&mut est.alpha, self.estimators.alpha);
        overlay(&mut est.n_bootstrap_samples, self.estimators.n_bootstrap_samples);
        overlay(&mut est.switch_tau, self.estimators.switch_tau);

        let reg = &mut settings.regression;
        overlay(&mut reg.base_model, self.regression.base_model);
        overlay(&mut reg.lambda, self.regression.lambda);
        overlay(&mut reg.max_iter, self.regression.max_iter);
        overlay(&mut reg.n_trees, self.regression.n_trees);
        overlay(&mut reg.max_depth, self.regression.max_depth);
        overlay(&mut reg.min_samples_split, self.regression.min_samples_split);

        let pol = &mut settings.policy;
        overlay(&mut pol.epsilon, self.policy.epsilon);
        overlay(&mut pol.alpha, self.policy.alpha);
        overlay(&mut pol.lambda, self.policy.lambda);
        overlay(&mut pol.batch_size, self.policy.batch_size);
    }
}
