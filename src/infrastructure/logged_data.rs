//! CSV persistence for logged bandit feedback.
//!
//! The feedback file has one row per round with header
//! `action,reward,pscore,x_0,...,x_{d-1}`. The optional action context file
//! has one row per action with header `e_0,...,e_{k-1}`.

use crate::domain::feedback::BanditFeedback;
use anyhow::{Context, Result, anyhow, bail};
use ndarray::Array2;
use std::path::Path;
use tracing::{debug, info};

const FIXED_COLUMNS: [&str; 3] = ["action", "reward", "pscore"];

fn parse_field<T: std::str::FromStr>(record: &csv::StringRecord, idx: usize, line: usize) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = record
        .get(idx)
        .ok_or_else(|| anyhow!("Row {} is missing column {}", line, idx))?;
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("Failed to parse '{}' in row {}, column {}", raw, line, idx))
}

/// Read logged feedback, using the identity action context when no action
/// context file is given.
pub fn read_bandit_feedback(path: &Path, action_context_path: Option<&Path>) -> Result<BanditFeedback> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open logged data {}", path.display()))?;

    let headers = reader.headers()?.clone();
    if headers.len() < FIXED_COLUMNS.len()
        || headers.iter().zip(FIXED_COLUMNS).any(|(h, expected)| h.trim() != expected)
    {
        bail!(
            "Logged data {} must start with columns action,reward,pscore",
            path.display()
        );
    }
    let dim_context = headers.len() - FIXED_COLUMNS.len();

    let mut action = Vec::new();
    let mut reward = Vec::new();
    let mut pscore = Vec::new();
    let mut context_values = Vec::new();

    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed row {} in {}", line, path.display()))?;
        action.push(parse_field::<usize>(&record, 0, line)?);
        reward.push(parse_field::<f64>(&record, 1, line)?);
        pscore.push(parse_field::<f64>(&record, 2, line)?);
        for j in 0..dim_context {
            context_values.push(parse_field::<f64>(&record, FIXED_COLUMNS.len() + j, line)?);
        }
    }

    let n_rounds = action.len();
    if n_rounds == 0 {
        bail!("Logged data {} has no rounds", path.display());
    }
    let context = Array2::from_shape_vec((n_rounds, dim_context), context_values)?;

    let action_context = match action_context_path {
        Some(p) => read_action_context(p)?,
        None => {
            let n_actions = action.iter().max().map_or(0, |a| a + 1);
            debug!("No action context given; using identity over {} actions", n_actions);
            Array2::eye(n_actions)
        }
    };

    let feedback = BanditFeedback {
        n_rounds,
        n_actions: action_context.nrows(),
        context,
        action_context,
        action,
        reward,
        pscore,
        expected_reward: None,
    };
    feedback
        .validate()
        .with_context(|| format!("Invalid logged data in {}", path.display()))?;

    info!(
        "Loaded {} rounds ({} actions, {} context features) from {}",
        feedback.n_rounds,
        feedback.n_actions,
        dim_context,
        path.display()
    );
    Ok(feedback)
}

pub fn read_action_context(path: &Path) -> Result<Array2<f64>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open action context {}", path.display()))?;
    let dim = reader.headers()?.len();
    if dim == 0 {
        bail!("Action context {} has no columns", path.display());
    }

    let mut values = Vec::new();
    let mut rows = 0;
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed row {} in {}", line, path.display()))?;
        for j in 0..dim {
            values.push(parse_field::<f64>(&record, j, line)?);
        }
        rows += 1;
    }
    if rows == 0 {
        bail!("Action context {} has no rows", path.display());
    }
    Ok(Array2::from_shape_vec((rows, dim), values)?)
}

pub fn write_bandit_feedback(
    feedback: &BanditFeedback,
    path: &Path,
    action_context_path: Option<&Path>,
) -> Result<()> {
    feedback.validate()?;

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend((0..feedback.dim_context()).map(|j| format!("x_{}", j)));
    writer.write_record(&header)?;

    for i in 0..feedback.n_rounds {
        let mut record = vec![
            feedback.action[i].to_string(),
            feedback.reward[i].to_string(),
            feedback.pscore[i].to_string(),
        ];
        record.extend(feedback.context_row(i).iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if let Some(p) = action_context_path {
        write_action_context(&feedback.action_context, p)?;
    }
    info!("Wrote {} rounds to {}", feedback.n_rounds, path.display());
    Ok(())
}

pub fn write_action_context(action_context: &Array2<f64>, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let header: Vec<String> = (0..action_context.ncols()).map(|j| format!("e_{}", j)).collect();
    writer.write_record(&header)?;
    for row in action_context.rows() {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::synthetic::{BehaviorPolicy, RewardFunction, SyntheticBanditDataset};
    use std::fs;

    fn feedback() -> BanditFeedback {
        SyntheticBanditDataset::new(
            4,
            3,
            2,
            RewardFunction::Logistic,
            BehaviorPolicy::Linear,
            11,
        )
        .unwrap()
        .obtain_batch_bandit_feedback(50)
        .unwrap()
    }

    #[test]
    fn test_write_then_read_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("feedback.csv");
        let actions = dir.path().join("action_context.csv");
        let original = feedback();

        write_bandit_feedback(&original, &data, Some(&actions)).unwrap();
        let header = fs::read_to_string(&data).unwrap();
        assert!(header.starts_with("action,reward,pscore,x_0,x_1,x_2\n"));

        let loaded = read_bandit_feedback(&data, Some(&actions)).unwrap();
        assert_eq!(loaded.n_rounds, 50);
        assert_eq!(loaded.n_actions, 4);
        assert_eq!(loaded.action, original.action);
        assert_eq!(loaded.reward, original.reward);
        assert_eq!(loaded.pscore, original.pscore);
        assert_eq!(loaded.context, original.context);
        assert_eq!(loaded.action_context, original.action_context);
        assert!(loaded.expected_reward.is_none());
    }

    #[test]
    fn test_identity_action_context_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("feedback.csv");
        fs::write(
            &data,
            "action,reward,pscore,x_0\n0,1,0.5,0.1\n2,0,0.25,-0.3\n1,1,0.25,0.7\n",
        )
        .unwrap();

        let loaded = read_bandit_feedback(&data, None).unwrap();
        assert_eq!(loaded.n_actions, 3);
        assert_eq!(loaded.action_context, Array2::<f64>::eye(3));
        assert_eq!(loaded.dim_context(), 1);
    }

    #[test]
    fn test_malformed_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad_header = dir.path().join("bad_header.csv");
        fs::write(&bad_header, "a,r,p\n0,1,0.5\n").unwrap();
        assert!(read_bandit_feedback(&bad_header, None).is_err());

        let bad_pscore = dir.path().join("bad_pscore.csv");
        fs::write(&bad_pscore, "action,reward,pscore,x_0\n0,1,0.0,0.1\n").unwrap();
        assert!(read_bandit_feedback(&bad_pscore, None).is_err());

        let bad_value = dir.path().join("bad_value.csv");
        fs::write(&bad_value, "action,reward,pscore\nzero,1,0.5\n").unwrap();
        assert!(read_bandit_feedback(&bad_value, None).is_err());

        let empty = dir.path().join("empty.csv");
        fs::write(&empty, "action,reward,pscore\n").unwrap();
        assert!(read_bandit_feedback(&empty, None).is_err());

        assert!(read_bandit_feedback(&dir.path().join("missing.csv"), None).is_err());
    }
}
