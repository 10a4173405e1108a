//! Counterfactual policy hyperparameters from environment variables.

use super::parse_env;
use crate::domain::policy::PolicyParams;
use anyhow::{Context, Result};

pub struct PolicyEnvConfig;

impl PolicyEnvConfig {
    pub fn from_env() -> Result<PolicyParams> {
        let defaults = PolicyParams::default();
        let params = PolicyParams {
            epsilon: parse_env("POLICY_EPSILON", defaults.epsilon)?,
            alpha: parse_env("POLICY_ALPHA", defaults.alpha)?,
            lambda: parse_env("POLICY_LAMBDA", defaults.lambda)?,
            batch_size: parse_env("POLICY_BATCH_SIZE", defaults.batch_size)?,
        };
        params.validate().context("Invalid policy configuration")?;
        Ok(params)
    }
}
