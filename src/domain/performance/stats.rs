use statrs::statistics::{Data, Distribution};

/// Shared statistics utilities for price series.
pub struct Stats;

impl Stats {
    /// Arithmetic mean, 0 for an empty slice.
    pub fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    /// Mean absolute value, 0 for an empty slice.
    pub fn mean_abs(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64
    }

    /// Simple fractional returns. Steps from a non-positive price are skipped.
    pub fn calculate_returns(prices: &[f64]) -> Vec<f64> {
        prices
            .windows(2)
            .filter(|w| w[0] > 0.0)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect()
    }

    /// Sample standard deviation of the last `window` returns of `prices`.
    ///
    /// None when fewer than two returns are available.
    pub fn return_volatility(prices: &[f64], window: usize) -> Option<f64> {
        let returns = Self::calculate_returns(prices);
        let start = returns.len().saturating_sub(window.max(2));
        let recent = &returns[start..];
        if recent.len() < 2 {
            return None;
        }

        // statrs uses the n-1 estimator
        let data = Data::new(recent.to_vec());
        data.std_dev().filter(|s| s.is_finite())
    }
}
