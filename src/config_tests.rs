use crate::application::regression::BaseModel;
use crate::config::Settings;
use std::env;
use std::io::Write;
use std::sync::Mutex;
use std::sync::OnceLock;

// Environment variables are process-global; serialize the tests touching them.
static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn get_env_lock() -> &'static Mutex<()> {
    ENV_LOCK.get_or_init(|| Mutex::new(()))
}

const KEYS: [&str; 13] = [
    "OPE_ALPHA",
    "OPE_N_BOOTSTRAP_SAMPLES",
    "OPE_SWITCH_TAU",
    "OPE_BASE_MODEL",
    "OPE_REG_LAMBDA",
    "OPE_REG_MAX_ITER",
    "OPE_RF_N_TREES",
    "OPE_RF_MAX_DEPTH",
    "OPE_RF_MIN_SAMPLES_SPLIT",
    "POLICY_EPSILON",
    "POLICY_ALPHA",
    "POLICY_LAMBDA",
    "POLICY_BATCH_SIZE",
];

fn clear_env() {
    for key in KEYS {
        unsafe { env::remove_var(key) };
    }
}

#[test]
fn test_settings_defaults_without_env() {
    let _guard = get_env_lock().lock().unwrap();
    clear_env();

    let settings = Settings::from_env().unwrap();
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.estimators.n_bootstrap_samples, 10_000);
    assert_eq!(settings.regression.base_model, BaseModel::LogisticRegression);
    assert_eq!(settings.policy.batch_size, 1);
}

#[test]
fn test_settings_read_env_overrides() {
    let _guard = get_env_lock().lock().unwrap();
    clear_env();
    unsafe {
        env::set_var("OPE_ALPHA", "0.1");
        env::set_var("OPE_N_BOOTSTRAP_SAMPLES", "500");
        env::set_var("OPE_BASE_MODEL", "random_forest");
        env::set_var("POLICY_EPSILON", "0.3");
    }

    let settings = Settings::from_env().unwrap();
    assert!((settings.estimators.alpha - 0.1).abs() < 1e-12);
    assert_eq!(settings.estimators.n_bootstrap_samples, 500);
    assert_eq!(settings.regression.base_model, BaseModel::RandomForest);
    assert!((settings.policy.epsilon - 0.3).abs() < 1e-12);

    clear_env();
}

#[test]
fn test_settings_reject_malformed_env() {
    let _guard = get_env_lock().lock().unwrap();
    clear_env();

    unsafe { env::set_var("OPE_N_BOOTSTRAP_SAMPLES", "many") };
    assert!(Settings::from_env().is_err());

    clear_env();
    unsafe { env::set_var("POLICY_EPSILON", "1.5") };
    assert!(Settings::from_env().is_err());

    clear_env();
    unsafe { env::set_var("OPE_BASE_MODEL", "gradient_boosting") };
    assert!(Settings::from_env().is_err());

    clear_env();
}

#[test]
fn test_settings_file_overrides_env() {
    let _guard = get_env_lock().lock().unwrap();
    clear_env();
    unsafe { env::set_var("OPE_SWITCH_TAU", "5.0") };

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[estimators]\nswitch_tau = 2.5\nn_bootstrap_samples = 200\n\n[regression]\nbase_model = \"random_forest\"\nn_trees = 7\n\n[policy]\nalpha = 0.5"
    )
    .unwrap();

    let settings = Settings::load(Some(file.path())).unwrap();
    assert!((settings.estimators.switch_tau - 2.5).abs() < 1e-12);
    assert_eq!(settings.estimators.n_bootstrap_samples, 200);
    assert_eq!(settings.regression.base_model, BaseModel::RandomForest);
    assert_eq!(settings.regression.n_trees, 7);
    assert!((settings.policy.alpha - 0.5).abs() < 1e-12);
    // Untouched keys keep their env/default values.
    assert!((settings.estimators.alpha - 0.05).abs() < 1e-12);

    clear_env();
}

#[test]
fn test_settings_file_errors() {
    let _guard = get_env_lock().lock().unwrap();
    clear_env();

    let missing = std::path::Path::new("/nonexistent/opebench.toml");
    assert!(Settings::load(Some(missing)).is_err());

    let mut settings = Settings::default();
    assert!(settings.apply_toml("[estimators]\nunknown_key = 1").is_err());
    assert!(settings.apply_toml("[estimators]\nalpha = 2.0").is_err());
    assert!(Settings::default().apply_toml("").is_ok());
}
