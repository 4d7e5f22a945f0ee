//! Prometheus metrics definitions for Pricecast
//!
//! All metrics use the `pricecast_` prefix and are read-only.

use crate::domain::ensemble::{Calibration, CalibrationOutcome, EnsembleState, PredictionResult};
use crate::domain::performance::BacktestMetrics;
use prometheus::{
    CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGaugeVec},
};
use std::sync::Arc;

const SEQUENCE_MODEL: &str = "lstm";
const TREE_MODEL: &str = "xgboost";

/// Prometheus metrics for forecasting runs
#[derive(Clone)]
pub struct ForecastMetrics {
    registry: Arc<Registry>,
    /// Forecasts produced, by symbol and direction
    pub predictions_total: CounterVec,
    /// Confidence of the latest forecast (0-100)
    pub prediction_confidence: GenericGaugeVec<AtomicF64>,
    /// Predicted change of the latest forecast, in percent
    pub predicted_change_pct: GenericGaugeVec<AtomicF64>,
    /// Ensemble weight per symbol and model
    pub ensemble_weight: GenericGaugeVec<AtomicF64>,
    /// Additive bias correction per symbol and model, in price units
    pub bias_correction: GenericGaugeVec<AtomicF64>,
    /// Calibrations by outcome
    pub calibrations_total: CounterVec,
    /// Backtest direction accuracy in percent
    pub backtest_direction_accuracy: GenericGaugeVec<AtomicF64>,
    /// Backtest error metrics by kind (mae, rmse, mape)
    pub backtest_error: GenericGaugeVec<AtomicF64>,
    /// Failed symbols in batch runs, by stage
    pub batch_failures_total: CounterVec,
    /// Wall time of a per-symbol stage
    pub stage_duration_seconds: HistogramVec,
}

impl ForecastMetrics {
    /// Create a new metrics instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let predictions_total = CounterVec::new(
            Opts::new(
                "pricecast_predictions_total",
                "Total forecasts by symbol and direction",
            ),
            &["symbol", "direction"],
        )?;
        registry.register(Box::new(predictions_total.clone()))?;

        let prediction_confidence = GaugeVec::new(
            Opts::new(
                "pricecast_prediction_confidence",
                "Confidence of the latest forecast (0-100)",
            ),
            &["symbol"],
        )?;
        registry.register(Box::new(prediction_confidence.clone()))?;

        let predicted_change_pct = GaugeVec::new(
            Opts::new(
                "pricecast_predicted_change_pct",
                "Predicted price change of the latest forecast in percent",
            ),
            &["symbol"],
        )?;
        registry.register(Box::new(predicted_change_pct.clone()))?;

        let ensemble_weight = GaugeVec::new(
            Opts::new("pricecast_ensemble_weight", "Ensemble weight per model"),
            &["symbol", "model"],
        )?;
        registry.register(Box::new(ensemble_weight.clone()))?;

        let bias_correction = GaugeVec::new(
            Opts::new(
                "pricecast_bias_correction",
                "Additive bias correction per model in price units",
            ),
            &["symbol", "model"],
        )?;
        registry.register(Box::new(bias_correction.clone()))?;

        let calibrations_total = CounterVec::new(
            Opts::new("pricecast_calibrations_total", "Calibrations by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(calibrations_total.clone()))?;

        let backtest_direction_accuracy = GaugeVec::new(
            Opts::new(
                "pricecast_backtest_direction_accuracy",
                "Backtest direction accuracy in percent",
            ),
            &["symbol"],
        )?;
        registry.register(Box::new(backtest_direction_accuracy.clone()))?;

        let backtest_error = GaugeVec::new(
            Opts::new("pricecast_backtest_error", "Backtest error metrics"),
            &["symbol", "kind"],
        )?;
        registry.register(Box::new(backtest_error.clone()))?;

        let batch_failures_total = CounterVec::new(
            Opts::new(
                "pricecast_batch_failures_total",
                "Symbols that failed in a batch run",
            ),
            &["stage"],
        )?;
        registry.register(Box::new(batch_failures_total.clone()))?;

        let stage_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pricecast_stage_duration_seconds",
                "Wall time of a per-symbol stage in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
            &["stage"],
        )?;
        registry.register(Box::new(stage_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            predictions_total,
            prediction_confidence,
            predicted_change_pct,
            ensemble_weight,
            bias_correction,
            calibrations_total,
            backtest_direction_accuracy,
            backtest_error,
            batch_failures_total,
            stage_duration_seconds,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn record_prediction(&self, symbol: &str, prediction: &PredictionResult) {
        self.predictions_total
            .with_label_values(&[symbol, prediction.direction.as_str()])
            .inc();
        self.prediction_confidence
            .with_label_values(&[symbol])
            .set(prediction.confidence);
        self.predicted_change_pct
            .with_label_values(&[symbol])
            .set(prediction.price_change_percent);
    }

    pub fn record_state(&self, symbol: &str, state: &EnsembleState) {
        self.ensemble_weight
            .with_label_values(&[symbol, SEQUENCE_MODEL])
            .set(state.sequence_weight);
        self.ensemble_weight
            .with_label_values(&[symbol, TREE_MODEL])
            .set(state.tree_weight);
        self.bias_correction
            .with_label_values(&[symbol, SEQUENCE_MODEL])
            .set(state.sequence_bias);
        self.bias_correction
            .with_label_values(&[symbol, TREE_MODEL])
            .set(state.tree_bias);
    }

    pub fn record_calibration(&self, symbol: &str, calibration: &Calibration) {
        let outcome = match calibration.outcome {
            CalibrationOutcome::Reweighted => "reweighted",
            CalibrationOutcome::DegenerateCalibration => "degenerate",
        };
        self.calibrations_total.with_label_values(&[outcome]).inc();
        self.record_state(symbol, &calibration.state);
    }

    pub fn record_backtest(&self, symbol: &str, metrics: &BacktestMetrics) {
        self.backtest_direction_accuracy
            .with_label_values(&[symbol])
            .set(metrics.direction_accuracy);
        for (kind, value) in [
            ("mae", metrics.mae),
            ("rmse", metrics.rmse),
            ("mape", metrics.mape),
        ] {
            self.backtest_error
                .with_label_values(&[symbol, kind])
                .set(value);
        }
    }

    pub fn inc_batch_failures(&self, stage: &str) {
        self.batch_failures_total.with_label_values(&[stage]).inc();
    }

    pub fn observe_stage(&self, stage: &str, seconds: f64) {
        self.stage_duration_seconds
            .with_label_values(&[stage])
            .observe(seconds);
    }
}
