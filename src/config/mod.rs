//! Configuration module for Pricecast.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: Windowing, Ensemble, Storage, and Observability.

mod ensemble_config;
mod observability_config;
mod storage_config;
mod windowing_config;

pub use ensemble_config::EnsembleEnvConfig;
pub use observability_config::ObservabilityEnvConfig;
pub use storage_config::StorageEnvConfig;
pub use windowing_config::WindowingEnvConfig;

use crate::application::pipeline::PipelineSettings;
use crate::domain::ensemble::EnsembleState;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Main application configuration.
///
/// This struct aggregates all configuration from sub-modules.
#[derive(Debug, Clone)]
pub struct Config {
    // Core
    pub symbols: Vec<String>,

    // Windowing (from WindowingEnvConfig)
    pub sequence_length: usize,
    pub prediction_horizon: usize,
    pub lookback: usize,
    pub volatility_window: usize,
    pub test_size: f64,

    // Ensemble (from EnsembleEnvConfig)
    pub lstm_weight: f64,
    pub xgboost_weight: f64,
    pub neutral_threshold: f64,

    // Storage (from StorageEnvConfig)
    pub model_dir: PathBuf,
    pub data_dir: PathBuf,

    // Observability (from ObservabilityEnvConfig)
    pub metrics_enabled: bool,
    pub run_summary_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This orchestrates loading from all sub-config modules and composes
    /// them into a unified Config struct.
    pub fn from_env() -> Result<Self> {
        let symbols = env::var("SYMBOLS")
            .unwrap_or_else(|_| "AAPL".to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        let windowing =
            WindowingEnvConfig::from_env().context("Failed to load windowing config")?;
        let ensemble = EnsembleEnvConfig::from_env().context("Failed to load ensemble config")?;
        let storage = StorageEnvConfig::from_env();
        let observability = ObservabilityEnvConfig::from_env();

        Ok(Self {
            symbols,

            sequence_length: windowing.sequence_length,
            prediction_horizon: windowing.prediction_horizon,
            lookback: windowing.lookback,
            volatility_window: windowing.volatility_window,
            test_size: windowing.test_size,

            lstm_weight: ensemble.lstm_weight,
            xgboost_weight: ensemble.xgboost_weight,
            neutral_threshold: ensemble.neutral_threshold,

            model_dir: storage.model_dir,
            data_dir: storage.data_dir,

            metrics_enabled: observability.metrics_enabled,
            run_summary_enabled: observability.run_summary_enabled,
        })
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            sequence_length: self.sequence_length,
            prediction_horizon: self.prediction_horizon,
            lookback: self.lookback,
            volatility_window: self.volatility_window,
        }
    }

    /// Ensemble state used before a symbol has a calibrated config.
    pub fn initial_ensemble(&self) -> EnsembleState {
        EnsembleState::new(self.lstm_weight, self.xgboost_weight, self.neutral_threshold)
    }

    /// Feature CSV for `symbol` under the data directory.
    pub fn feature_file(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", symbol.to_uppercase()))
    }
}
