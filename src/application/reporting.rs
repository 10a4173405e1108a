use crate::application::evaluation::EvaluationSummary;
use crate::application::ope::PolicyValueSummary;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const TABLE_WIDTH: usize = 72;

#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub timestamp: DateTime<Utc>,
    pub summary: EvaluationSummary,
}

/// Estimated value of the counterfactual policy, also relative to the
/// logged (behavior) policy's empirical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyValueRow {
    pub estimator: String,
    pub estimated_policy_value: f64,
    pub relative_estimated_policy_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl PolicyValueRow {
    pub fn from_summaries(summaries: &[PolicyValueSummary], behavior_value: f64) -> Vec<Self> {
        summaries
            .iter()
            .map(|s| PolicyValueRow {
                estimator: s.estimator.clone(),
                estimated_policy_value: s.estimated_policy_value,
                relative_estimated_policy_value: if behavior_value != 0.0 {
                    s.estimated_policy_value / behavior_value
                } else {
                    f64::NAN
                },
                ci_lower: s.ci_lower,
                ci_upper: s.ci_upper,
            })
            .collect()
    }
}

pub struct EvaluationReporter {
    confidence_label: String,
}

impl Default for EvaluationReporter {
    fn default() -> Self {
        Self::new("95.0%")
    }
}

impl EvaluationReporter {
    pub fn new(confidence_label: impl Into<String>) -> Self {
        Self {
            confidence_label: confidence_label.into(),
        }
    }

    /// Results table of relative estimation errors, one row per estimator.
    pub fn render_table(&self, summary: &EvaluationSummary) -> String {
        let mut out = String::new();
        let lower = format!("{} CI (lower)", self.confidence_label);
        let upper = format!("{} CI (upper)", self.confidence_label);

        let _ = writeln!(out, "{}", "=".repeat(TABLE_WIDTH));
        let _ = writeln!(out, "random_state={}", summary.random_state);
        let _ = writeln!(out, "{}", "-".repeat(TABLE_WIDTH));
        let _ = writeln!(
            out,
            "{:<10} {:>16} {:>20} {:>20}",
            "estimator", "mean", lower, upper
        );
        for row in &summary.rows {
            let _ = writeln!(
                out,
                "{:<10} {:>16.6} {:>20.6} {:>20.6}",
                row.estimator, row.mean, row.ci_lower, row.ci_upper
            );
        }
        let _ = writeln!(out, "{}", "=".repeat(TABLE_WIDTH));
        out
    }

    pub fn save_csv(&self, summary: &EvaluationSummary, output_dir: &Path) -> Result<PathBuf> {
        ensure_dir(output_dir)?;
        let path = output_dir.join(format!(
            "relative_ee_{}_{}.csv",
            summary.counterfactual_policy, summary.random_state
        ));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(["estimator", "mean", "ci_lower", "ci_upper"])?;
        for row in &summary.rows {
            writer.serialize((&row.estimator, row.mean, row.ci_lower, row.ci_upper))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Summary saved to: {}", path.display());
        Ok(path)
    }

    pub fn save_json(&self, summary: &EvaluationSummary, output_dir: &Path) -> Result<PathBuf> {
        ensure_dir(output_dir)?;
        let timestamp = Utc::now();
        let report = EvaluationReport {
            timestamp,
            summary: summary.clone(),
        };
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        let path = output_dir.join(format!(
            "evaluation_report_{}.json",
            timestamp.format("%Y%m%d_%H%M%S")
        ));
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Report saved to: {}", path.display());
        Ok(path)
    }

    /// Header line plus value table for a single counterfactual policy.
    pub fn render_policy_values(
        &self,
        random_state: u64,
        policy_name: &str,
        rows: &[PolicyValueRow],
    ) -> String {
        let mut out = String::new();
        let lower = format!("{} CI (lower)", self.confidence_label);
        let upper = format!("{} CI (upper)", self.confidence_label);

        let _ = writeln!(out, "{}", "=".repeat(TABLE_WIDTH + 32));
        let _ = writeln!(
            out,
            "random_state={}: counterfactual policy={}",
            random_state, policy_name
        );
        let _ = writeln!(out, "{}", "-".repeat(TABLE_WIDTH + 32));
        let _ = writeln!(
            out,
            "{:<10} {:>22} {:>32} {:>20} {:>20}",
            "estimator",
            "estimated_policy_value",
            "relative_estimated_policy_value",
            lower,
            upper
        );
        for row in rows {
            let _ = writeln!(
                out,
                "{:<10} {:>22.6} {:>32.6} {:>20.6} {:>20.6}",
                row.estimator,
                row.estimated_policy_value,
                row.relative_estimated_policy_value,
                row.ci_lower,
                row.ci_upper
            );
        }
        let _ = writeln!(out, "{}", "=".repeat(TABLE_WIDTH + 32));
        out
    }

    pub fn save_policy_values_csv(
        &self,
        policy_name: &str,
        rows: &[PolicyValueRow],
        output_dir: &Path,
    ) -> Result<PathBuf> {
        ensure_dir(output_dir)?;
        let path = output_dir.join(format!("{}.csv", policy_name));
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Policy values saved to: {}", path.display());
        Ok(path)
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create output directory {}", path.display()))?;
    }
    Ok(())
}
