//! Reward regression configuration parsing from environment variables.

use super::parse_env;
use crate::application::regression::{BaseModel, RegressionSettings};
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

pub struct RegressionEnvConfig;

impl RegressionEnvConfig {
    pub fn from_env() -> Result<RegressionSettings> {
        let defaults = RegressionSettings::default();

        let base_model = match env::var("OPE_BASE_MODEL") {
            Ok(value) => BaseModel::from_str(&value).context("Failed to parse OPE_BASE_MODEL")?,
            Err(_) => defaults.base_model,
        };

        Ok(RegressionSettings {
            base_model,
            lambda: parse_env("OPE_REG_LAMBDA", defaults.lambda)?,
            max_iter: parse_env("OPE_REG_MAX_ITER", defaults.max_iter)?,
            n_trees: parse_env("OPE_RF_N_TREES", defaults.n_trees)?,
            max_depth: parse_env("OPE_RF_MAX_DEPTH", defaults.max_depth)?,
            min_samples_split: parse_env("OPE_RF_MIN_SAMPLES_SPLIT", defaults.min_samples_split)?,
        })
    }
}
