//! Ensemble configuration parsing from environment variables.
//!
//! Initial weights and neutral threshold used before a symbol is calibrated.

use anyhow::{Context, Result, bail};
use std::env;

/// Ensemble environment configuration
#[derive(Debug, Clone)]
pub struct EnsembleEnvConfig {
    pub lstm_weight: f64,
    pub xgboost_weight: f64,
    pub neutral_threshold: f64,
}

impl EnsembleEnvConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            lstm_weight: Self::parse_f64("ENSEMBLE_LSTM_WEIGHT", 0.6)?,
            xgboost_weight: Self::parse_f64("ENSEMBLE_XGBOOST_WEIGHT", 0.4)?,
            neutral_threshold: Self::parse_f64("NEUTRAL_THRESHOLD", 0.005)?,
        };

        if config.lstm_weight < 0.0 || config.xgboost_weight < 0.0 {
            bail!("Ensemble weights must be non-negative");
        }
        if config.neutral_threshold < 0.0 {
            bail!("NEUTRAL_THRESHOLD must be non-negative");
        }
        Ok(config)
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<f64>()
            .context(format!("Failed to parse {}", key))
    }
}
