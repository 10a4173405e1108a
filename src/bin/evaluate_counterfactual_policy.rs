use anyhow::Context;
use clap::Parser;
use opebench::application::ope::OffPolicyEvaluation;
use opebench::application::regression::RegressionModel;
use opebench::application::reporting::{EvaluationReporter, PolicyValueRow};
use opebench::application::simulator::{convert_to_action_dist, run_bandit_simulation};
use opebench::config::Settings;
use opebench::domain::estimators::{EstimatorFactory, EstimatorInput, EstimatorKind};
use opebench::domain::policy::{PolicyFactory, PolicyKind};
use opebench::infrastructure::read_bandit_feedback;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

/// Estimate the value of a logistic contextual bandit policy from logged data.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Logged feedback CSV (action,reward,pscore,x_0,...)
    #[arg(long = "logged_data")]
    logged_data: PathBuf,

    /// Action context CSV (e_0,...); identity features when omitted
    #[arg(long = "action_context")]
    action_context: Option<PathBuf>,

    /// logistic_egreedy, logistic_ts or logistic_ucb
    #[arg(long = "counterfactual_policy", value_parser = parse_logistic_policy)]
    counterfactual_policy: PolicyKind,

    /// Exploration rate of logistic_egreedy
    #[arg(long, default_value_t = 0.1)]
    epsilon: f64,

    #[arg(long = "random_state", default_value_t = 12345)]
    random_state: u64,

    #[arg(long = "output_dir", default_value = "./logs")]
    output_dir: PathBuf,

    /// TOML settings overriding the environment
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_logistic_policy(s: &str) -> Result<PolicyKind, String> {
    match PolicyKind::from_str(s) {
        Ok(kind) if kind.is_logistic() => Ok(kind),
        _ => Err(format!(
            "{s} (expected one of logistic_egreedy, logistic_ts, logistic_ucb)"
        )),
    }
}

const ESTIMATORS: [EstimatorKind; 3] = [EstimatorKind::Ipw, EstimatorKind::Dm, EstimatorKind::Dr];

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

    let mut settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    settings.policy.epsilon = args.epsilon;
    settings.policy.validate().context("Invalid epsilon")?;

    let feedback = read_bandit_feedback(&args.logged_data, args.action_context.as_deref())?;

    let mut policy = PolicyFactory::create(
        args.counterfactual_policy,
        feedback.n_actions,
        feedback.dim_context(),
        &settings.policy,
        args.random_state,
    )?;
    let selected = run_bandit_simulation(&feedback, policy.as_mut())?;
    let action_dist = convert_to_action_dist(feedback.n_actions, &selected)?;

    let estimated_rewards = if ESTIMATORS.iter().any(|k| k.needs_regression()) {
        let mut regression =
            RegressionModel::new(&settings.regression, feedback.action_context.clone())?;
        let estimated = regression
            .fit_predict(&feedback)
            .context("Failed to fit the reward regression")?;
        info!("Fitted {} reward model", regression.base_name());
        Some(estimated)
    } else {
        None
    };

    let input = EstimatorInput {
        reward: &feedback.reward,
        action: &feedback.action,
        pscore: &feedback.pscore,
        action_dist: &action_dist,
        estimated_rewards: estimated_rewards.as_ref(),
    };
    let ope = OffPolicyEvaluation::new(EstimatorFactory::create_all(
        &ESTIMATORS,
        &settings.estimators.estimator_params(),
    )?)?;
    let summaries = ope.summarize_off_policy_estimates(
        &input,
        settings.estimators.alpha,
        settings.estimators.n_bootstrap_samples,
        args.random_state,
    )?;

    let behavior_value = feedback.mean_reward();
    info!("Empirical value of the behavior policy: {:.6}", behavior_value);
    let rows = PolicyValueRow::from_summaries(&summaries, behavior_value);

    let policy_name = policy.policy_name();
    let reporter = EvaluationReporter::new(settings.estimators.confidence_label());
    print!(
        "{}",
        reporter.render_policy_values(args.random_state, &policy_name, &rows)
    );
    reporter.save_policy_values_csv(&policy_name, &rows, &args.output_dir)?;
    Ok(())
}
