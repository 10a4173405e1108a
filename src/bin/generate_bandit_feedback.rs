use anyhow::Context;
use clap::Parser;
use opebench::domain::synthetic::{BehaviorPolicy, RewardFunction, SyntheticBanditDataset};
use opebench::infrastructure::logged_data::write_action_context;
use opebench::infrastructure::write_bandit_feedback;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

/// Draw synthetic logged bandit feedback and save it as CSV.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long = "n_rounds", default_value_t = 10_000)]
    n_rounds: usize,

    #[arg(long = "n_actions", default_value_t = 10)]
    n_actions: usize,

    #[arg(long = "dim_context", default_value_t = 5)]
    dim_context: usize,

    #[arg(long = "dim_action_context", default_value_t = 5)]
    dim_action_context: usize,

    #[arg(long = "random_state", default_value_t = 12345)]
    random_state: u64,

    /// Destination of the logged feedback CSV
    #[arg(long)]
    output: PathBuf,

    /// Destination of the action context CSV
    #[arg(long = "action_context_output")]
    action_context_output: Option<PathBuf>,

    /// linear or uniform
    #[arg(long = "behavior_policy", default_value = "linear", value_parser = BehaviorPolicy::from_str)]
    behavior_policy: BehaviorPolicy,

    /// logistic or linear
    #[arg(long = "reward_function", default_value = "logistic", value_parser = RewardFunction::from_str)]
    reward_function: RewardFunction,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let args = Args::parse();
    let mut dataset = SyntheticBanditDataset::new(
        args.n_actions,
        args.dim_context,
        args.dim_action_context,
        args.reward_function,
        args.behavior_policy,
        args.random_state,
    )?;
    let feedback = dataset.obtain_batch_bandit_feedback(args.n_rounds)?;

    write_bandit_feedback(&feedback, &args.output, None)
        .with_context(|| format!("Failed to save {}", args.output.display()))?;
    if let Some(path) = args.action_context_output.as_deref() {
        write_action_context(&feedback.action_context, path)?;
        info!("Action context saved to {}", path.display());
    }
    info!(
        "Generated {} rounds, mean reward {:.4}",
        feedback.n_rounds,
        feedback.mean_reward()
    );
    Ok(())
}
