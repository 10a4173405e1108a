use anyhow::Context;
use clap::Parser;
use opebench::application::evaluation::{ExperimentConfig, ExperimentRunner};
use opebench::application::reporting::EvaluationReporter;
use opebench::config::Settings;
use opebench::domain::policy::PolicyKind;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

/// Benchmark OPE estimators on synthetic bandit data.
///
/// Each run draws logged feedback from a synthetic environment, replays the
/// counterfactual policy on it, and measures the relative estimation error of
/// every estimator against the ground-truth policy value.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of independent simulations
    #[arg(long = "n_runs", default_value_t = 1)]
    n_runs: usize,

    /// Rounds of logged feedback per simulation
    #[arg(long = "n_rounds", default_value_t = 10_000)]
    n_rounds: usize,

    #[arg(long = "n_actions", default_value_t = 10)]
    n_actions: usize,

    #[arg(long = "dim_context", default_value_t = 5)]
    dim_context: usize,

    #[arg(long = "dim_action_context", default_value_t = 5)]
    dim_action_context: usize,

    /// bts, random, linear_ts, linear_ucb, linear_egreedy, logistic_ts,
    /// logistic_ucb or logistic_egreedy
    #[arg(long = "counterfactual_policy", value_parser = PolicyKind::from_str)]
    counterfactual_policy: PolicyKind,

    #[arg(long = "random_state", default_value_t = 12345)]
    random_state: u64,

    /// TOML settings overriding the environment
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write the summary as CSV and JSON into this directory
    #[arg(long = "output_dir")]
    output_dir: Option<PathBuf>,
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
    let settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;

    let config = ExperimentConfig {
        n_runs: args.n_runs,
        n_rounds: args.n_rounds,
        n_actions: args.n_actions,
        dim_context: args.dim_context,
        dim_action_context: args.dim_action_context,
        counterfactual_policy: args.counterfactual_policy,
        random_state: args.random_state,
    };
    let reporter = EvaluationReporter::new(settings.estimators.confidence_label());
    let runner = ExperimentRunner::new(config, settings)?;
    let summary = runner.run().context("Evaluation failed")?;

    print!("{}", reporter.render_table(&summary));

    if let Some(dir) = args.output_dir.as_deref() {
        reporter.save_csv(&summary, dir)?;
        reporter.save_json(&summary, dir)?;
    }
    info!("Done");
    Ok(())
}
