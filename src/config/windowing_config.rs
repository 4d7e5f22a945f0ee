//! Windowing configuration parsing from environment variables.
//!
//! Sequence and lookback lengths, forecast horizon, and the held-out split.

use anyhow::{Context, Result, bail};
use std::env;

/// Windowing environment configuration
#[derive(Debug, Clone)]
pub struct WindowingEnvConfig {
    pub sequence_length: usize,
    pub prediction_horizon: usize,
    pub lookback: usize,
    pub volatility_window: usize,
    /// Fraction of windows held out for evaluation
    pub test_size: f64,
}

impl WindowingEnvConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            sequence_length: Self::parse_usize("SEQUENCE_LENGTH", 60)?,
            prediction_horizon: Self::parse_usize("PREDICTION_HORIZON", 1)?,
            lookback: Self::parse_usize("LOOKBACK", 5)?,
            volatility_window: Self::parse_usize("VOLATILITY_WINDOW", 20)?,
            test_size: env::var("TEST_SIZE")
                .unwrap_or_else(|_| "0.2".to_string())
                .parse::<f64>()
                .context("Failed to parse TEST_SIZE")?,
        };

        if config.sequence_length == 0 || config.prediction_horizon == 0 || config.lookback == 0 {
            bail!("SEQUENCE_LENGTH, PREDICTION_HORIZON and LOOKBACK must be at least 1");
        }
        if !(config.test_size > 0.0 && config.test_size < 1.0) {
            bail!("TEST_SIZE must be between 0 and 1, got {}", config.test_size);
        }
        Ok(config)
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<usize>()
            .context(format!("Failed to parse {}", key))
    }
}
