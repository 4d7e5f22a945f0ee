use crate::application::ml::{SequencePredictor, WindowPredictor};
use crate::application::pipeline::ForecastPipeline;
use crate::domain::ensemble::{Calibration, Calibrator};
use crate::domain::errors::{ForecastError, ForecastResult};
use crate::domain::ml::FeatureMatrix;
use crate::domain::performance::{BacktestReport, Backtester, Stats};
use std::collections::HashMap;
use tracing::{debug, info};

/// Outcome of a held-out evaluation of both models and the ensemble.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub symbol: String,
    pub train_samples: usize,
    /// Test steps for which both models produced a prediction
    pub test_samples: usize,
    /// Mean absolute error in scaled units, per model
    pub sequence_scaled_mae: f64,
    pub tree_scaled_mae: f64,
    /// Ensemble backtest with the weights in force before calibration
    pub backtest: BacktestReport,
    pub calibration: Calibration,
}

/// Held-out evaluation: the tail `test_size` fraction of windows is replayed
/// through both models, backtested, and used to calibrate the ensemble.
///
/// The backtest runs with the pipeline's own ensemble state as it stands
/// before calibration.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationService {
    test_size: f64,
}

impl EvaluationService {
    pub fn new(test_size: f64) -> Self {
        Self {
            test_size: test_size.clamp(0.0, 1.0),
        }
    }

    pub fn test_size(&self) -> f64 {
        self.test_size
    }

    /// Fits `pipeline` on `raw`, evaluates both models on the test tail and
    /// swaps the calibrated ensemble state into the pipeline.
    ///
    /// Test steps are matched by target row, so both models always predict
    /// the same day.
    pub fn evaluate(
        &self,
        pipeline: &mut ForecastPipeline,
        raw: &FeatureMatrix,
        sequence_model: &dyn SequencePredictor,
        window_model: &dyn WindowPredictor,
    ) -> ForecastResult<EvaluationReport> {
        let data = pipeline.fit_transform(raw)?;
        let total = data.sequences.len();
        let n_test = (total as f64 * self.test_size) as usize;
        if n_test == 0 {
            return Err(ForecastError::InsufficientData {
                required: self.min_sequences(),
                available: total,
            });
        }

        let window_by_row: HashMap<usize, usize> = data
            .windows
            .target_rows
            .iter()
            .enumerate()
            .map(|(i, &row)| (row, i))
            .collect();

        let mut sequence_scaled = Vec::with_capacity(n_test);
        let mut tree_scaled = Vec::with_capacity(n_test);
        let mut targets = Vec::with_capacity(n_test);
        for i in total - n_test..total {
            let row = data.sequences.target_rows[i];
            let Some(&w) = window_by_row.get(&row) else {
                debug!("{}: no flattened window targets row {}", pipeline.symbol(), row);
                continue;
            };

            sequence_scaled.push(
                sequence_model
                    .predict(data.sequences.sequence(i))
                    .map_err(|reason| model_error(sequence_model.name(), reason))?,
            );
            tree_scaled.push(
                window_model
                    .predict(data.windows.window(w))
                    .map_err(|reason| model_error(window_model.name(), reason))?,
            );
            targets.push(data.sequences.targets[i]);
        }

        if targets.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let sequence_scaled_mae = scaled_mae(&sequence_scaled, &targets);
        let tree_scaled_mae = scaled_mae(&tree_scaled, &targets);
        info!(
            "{}: test MAE (normalized) - {}: {:.6}, {}: {:.6}",
            pipeline.symbol(),
            sequence_model.name(),
            sequence_scaled_mae,
            window_model.name(),
            tree_scaled_mae
        );

        let actuals = pipeline.inverse_scale_price(&targets)?;
        let sequence_prices = pipeline.inverse_scale_price(&sequence_scaled)?;
        let tree_prices = pipeline.inverse_scale_price(&tree_scaled)?;

        let backtest = Backtester::new(*pipeline.ensemble()).run(
            &sequence_prices,
            &tree_prices,
            &actuals,
            actuals[0],
        )?;
        info!(
            "{}: direction accuracy {:.2}%, MAE ${:.2}, RMSE ${:.2}, MAPE {:.2}%",
            pipeline.symbol(),
            backtest.metrics.direction_accuracy,
            backtest.metrics.mae,
            backtest.metrics.rmse,
            backtest.metrics.mape
        );

        let calibration =
            Calibrator::calibrate(pipeline.ensemble(), &sequence_prices, &tree_prices, &actuals)?;
        pipeline.apply_calibration(&calibration);

        Ok(EvaluationReport {
            symbol: pipeline.symbol().to_string(),
            train_samples: total - n_test,
            test_samples: targets.len(),
            sequence_scaled_mae,
            tree_scaled_mae,
            backtest,
            calibration,
        })
    }

    /// Smallest sequence count that yields at least one test step.
    fn min_sequences(&self) -> usize {
        if self.test_size > 0.0 {
            (1.0 / self.test_size).ceil() as usize
        } else {
            usize::MAX
        }
    }
}

impl Default for EvaluationService {
    fn default() -> Self {
        Self::new(0.2)
    }
}

fn scaled_mae(predictions: &[f64], targets: &[f64]) -> f64 {
    let errors: Vec<f64> = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| p - t)
        .collect();
    Stats::mean_abs(&errors)
}

fn model_error(model: &str, reason: String) -> ForecastError {
    ForecastError::Model {
        model: model.to_string(),
        reason,
    }
}
