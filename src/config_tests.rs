use crate::config::Config;
use std::env;
use std::sync::Mutex;
use std::sync::OnceLock;

// Global lock to prevent race conditions when modifying environment variables in tests
static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn get_env_lock() -> &'static Mutex<()> {
    ENV_LOCK.get_or_init(|| Mutex::new(()))
}

const KEYS: &[&str] = &[
    "SYMBOLS",
    "SEQUENCE_LENGTH",
    "PREDICTION_HORIZON",
    "LOOKBACK",
    "VOLATILITY_WINDOW",
    "TEST_SIZE",
    "ENSEMBLE_LSTM_WEIGHT",
    "ENSEMBLE_XGBOOST_WEIGHT",
    "NEUTRAL_THRESHOLD",
    "MODEL_DIR",
    "DATA_DIR",
    "METRICS_ENABLED",
    "RUN_SUMMARY_ENABLED",
];

fn clear_env() {
    for key in KEYS {
        // SAFETY: env access is serialized by ENV_LOCK
        unsafe { env::remove_var(key) };
    }
}

fn set_env(key: &str, value: &str) {
    // SAFETY: env access is serialized by ENV_LOCK
    unsafe { env::set_var(key, value) };
}

#[test]
fn test_config_defaults() {
    let _guard = get_env_lock().lock().unwrap();
    clear_env();

    let config = Config::from_env().unwrap();

    assert_eq!(config.symbols, vec!["AAPL".to_string()]);
    assert_eq!(config.sequence_length, 60);
    assert_eq!(config.prediction_horizon, 1);
    assert_eq!(config.lookback, 5);
    assert_eq!(config.volatility_window, 20);
    assert!((config.test_size - 0.2).abs() < 1e-12);

    let state = config.initial_ensemble();
    assert_eq!(state.sequence_weight, 0.6);
    assert_eq!(state.tree_weight, 0.4);
    assert_eq!(state.neutral_threshold, 0.005);

    assert!(config.model_dir.ends_with("trained_models"));
    assert!(config.feature_file("msft").ends_with("MSFT.csv"));
    assert!(!config.metrics_enabled);
    assert!(config.run_summary_enabled);
}

#[test]
fn test_config_overrides() {
    let _guard = get_env_lock().lock().unwrap();
    clear_env();

    set_env("SYMBOLS", "aapl, msft,,tsla");
    set_env("SEQUENCE_LENGTH", "30");
    set_env("LOOKBACK", "10");
    set_env("TEST_SIZE", "0.25");
    set_env("ENSEMBLE_LSTM_WEIGHT", "0.5");
    set_env("ENSEMBLE_XGBOOST_WEIGHT", "0.5");
    set_env("MODEL_DIR", "/tmp/pricecast-models");
    set_env("METRICS_ENABLED", "true");

    let config = Config::from_env().unwrap();

    assert_eq!(config.symbols, vec!["AAPL", "MSFT", "TSLA"]);
    let settings = config.pipeline_settings();
    assert_eq!(settings.sequence_length, 30);
    assert_eq!(settings.lookback, 10);
    assert!((config.test_size - 0.25).abs() < 1e-12);
    assert_eq!(config.initial_ensemble().sequence_weight, 0.5);
    assert_eq!(config.model_dir.to_str(), Some("/tmp/pricecast-models"));
    assert!(config.metrics_enabled);

    clear_env();
}

#[test]
fn test_config_rejects_invalid_values() {
    let _guard = get_env_lock().lock().unwrap();
    clear_env();

    set_env("TEST_SIZE", "1.5");
    assert!(Config::from_env().is_err());
    clear_env();

    set_env("SEQUENCE_LENGTH", "sixty");
    assert!(Config::from_env().is_err());
    clear_env();

    set_env("SEQUENCE_LENGTH", "0");
    assert!(Config::from_env().is_err());
    clear_env();

    set_env("ENSEMBLE_LSTM_WEIGHT", "-0.1");
    assert!(Config::from_env().is_err());
    clear_env();
}
