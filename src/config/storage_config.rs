//! Storage configuration parsing from environment variables.

use std::env;
use std::path::PathBuf;

/// Storage environment configuration
#[derive(Debug, Clone)]
pub struct StorageEnvConfig {
    /// Root of the per-symbol model directories
    pub model_dir: PathBuf,
    /// Where `<SYMBOL>.csv` feature files are looked up
    pub data_dir: PathBuf,
}

impl StorageEnvConfig {
    pub fn from_env() -> Self {
        Self {
            model_dir: PathBuf::from(
                env::var("MODEL_DIR").unwrap_or_else(|_| "trained_models".to_string()),
            ),
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string())),
        }
    }
}
