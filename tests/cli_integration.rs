use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn small_run(policy: &str, seed: &str) -> Command {
    let mut cmd = Command::cargo_bin("evaluate_off_policy_estimators").unwrap();
    cmd.env("OPE_N_BOOTSTRAP_SAMPLES", "200")
        .env("RUST_LOG", "warn")
        .args([
            "--n_runs",
            "2",
            "--n_rounds",
            "400",
            "--n_actions",
            "3",
            "--dim_context",
            "2",
            "--dim_action_context",
            "2",
            "--counterfactual_policy",
            policy,
            "--random_state",
            seed,
        ]);
    cmd
}

#[test]
fn test_table_has_six_estimator_rows() {
    let output = small_run("linear_egreedy", "12345").assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();

    assert!(stdout.contains("random_state=12345"));
    let rows: Vec<Vec<&str>> = stdout
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>())
        .filter(|cols| cols.len() == 4 && cols[1].parse::<f64>().is_ok())
        .collect();
    let names: Vec<&str> = rows.iter().map(|cols| cols[0]).collect();
    assert_eq!(names, vec!["dm", "ipw", "snipw", "dr", "sndr", "switch-dr"]);

    for cols in rows {
        let mean: f64 = cols[1].parse().unwrap();
        let lower: f64 = cols[2].parse().unwrap();
        let upper: f64 = cols[3].parse().unwrap();
        assert!(mean.is_finite());
        assert!(lower <= mean && mean <= upper);
    }
}

#[test]
fn test_unknown_policy_is_rejected() {
    small_run("neural_ucb", "1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("neural_ucb"));
}

#[test]
fn test_same_seed_reproduces_stdout() {
    let first = small_run("logistic_ucb", "99").assert().success();
    let second = small_run("logistic_ucb", "99").assert().success();
    assert_eq!(first.get_output().stdout, second.get_output().stdout);
    assert!(!first.get_output().stdout.is_empty());
}

#[test]
fn test_output_dir_receives_csv_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("logs");
    small_run("random", "5")
        .arg("--output_dir")
        .arg(&out)
        .assert()
        .success();

    let files: Vec<String> = fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert!(files.iter().any(|f| f == "relative_ee_random_5.csv"));
    assert!(files.iter().any(|f| f.ends_with(".json")));
}

#[test]
fn test_generate_then_evaluate_counterfactual_policy() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("feedback.csv");
    let actions = dir.path().join("action_context.csv");
    let logs = dir.path().join("logs");

    Command::cargo_bin("generate_bandit_feedback")
        .unwrap()
        .env("RUST_LOG", "warn")
        .args([
            "--n_rounds",
            "500",
            "--n_actions",
            "3",
            "--dim_context",
            "2",
            "--dim_action_context",
            "2",
            "--random_state",
            "3",
        ])
        .arg("--output")
        .arg(&data)
        .arg("--action_context_output")
        .arg(&actions)
        .assert()
        .success();
    assert!(
        fs::read_to_string(&data)
            .unwrap()
            .starts_with("action,reward,pscore,x_0,x_1")
    );

    Command::cargo_bin("evaluate_counterfactual_policy")
        .unwrap()
        .env("OPE_N_BOOTSTRAP_SAMPLES", "200")
        .env("RUST_LOG", "warn")
        .arg("--logged_data")
        .arg(&data)
        .arg("--action_context")
        .arg(&actions)
        .args(["--counterfactual_policy", "logistic_egreedy", "--epsilon", "0.1"])
        .arg("--output_dir")
        .arg(&logs)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "random_state=12345: counterfactual policy=logistic_egreedy_0.1",
        ))
        .stdout(predicate::str::contains("relative_estimated_policy_value"));

    let saved = fs::read_to_string(logs.join("logistic_egreedy_0.1.csv")).unwrap();
    assert_eq!(saved.lines().count(), 4);
    assert!(saved.contains("\nipw,"));
    assert!(saved.contains("\ndm,"));
    assert!(saved.contains("\ndr,"));
}

#[test]
fn test_counterfactual_tool_requires_logistic_policy() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("feedback.csv");
    fs::write(&data, "action,reward,pscore,x_0\n0,1,0.5,0.1\n1,0,0.5,0.2\n").unwrap();

    Command::cargo_bin("evaluate_counterfactual_policy")
        .unwrap()
        .arg("--logged_data")
        .arg(&data)
        .args(["--counterfactual_policy", "linear_ucb"])
        .arg("--output_dir")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--counterfactual_policy"))
        .stderr(predicate::str::contains("logistic_egreedy"));
}

#[test]
fn test_generate_with_linear_reward_function() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("feedback.csv");

    Command::cargo_bin("generate_bandit_feedback")
        .unwrap()
        .env("RUST_LOG", "warn")
        .args([
            "--n_rounds",
            "50",
            "--n_actions",
            "1",
            "--dim_context",
            "2",
            "--dim_action_context",
            "2",
            "--reward_function",
            "linear",
        ])
        .arg("--output")
        .arg(&data)
        .assert()
        .success();
    let content = fs::read_to_string(&data).unwrap();
    assert_eq!(content.lines().count(), 51);
    assert!(content.lines().skip(1).all(|line| line.starts_with("0,")));

    Command::cargo_bin("generate_bandit_feedback")
        .unwrap()
        .args(["--reward_function", "cubic"])
        .arg("--output")
        .arg(&data)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cubic"));
}
