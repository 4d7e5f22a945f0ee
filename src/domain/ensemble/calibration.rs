use super::state::EnsembleState;
use crate::domain::errors::{ForecastError, ForecastResult};
use crate::domain::performance::stats::Stats;
use tracing::{info, warn};

/// Whether calibration was able to re-derive the weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationOutcome {
    Reweighted,
    /// Both models fit the history exactly; weights left unchanged.
    DegenerateCalibration,
}

/// A freshly calibrated ensemble state. The caller swaps it in as a whole.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub state: EnsembleState,
    pub outcome: CalibrationOutcome,
    pub sequence_mae: f64,
    pub tree_mae: f64,
}

pub struct Calibrator;

impl Calibrator {
    /// Fits additive bias corrections and inverse-error weights from held-out
    /// `(sequence, tree, actual)` price triples.
    ///
    /// Biases overwrite the previous ones. The threshold is carried over.
    pub fn calibrate(
        current: &EnsembleState,
        sequence_preds: &[f64],
        tree_preds: &[f64],
        actuals: &[f64],
    ) -> ForecastResult<Calibration> {
        check_series(sequence_preds, tree_preds, actuals)?;

        let sequence_residuals: Vec<f64> = residuals(sequence_preds, actuals);
        let tree_residuals: Vec<f64> = residuals(tree_preds, actuals);

        let sequence_bias = Stats::mean(&sequence_residuals);
        let tree_bias = Stats::mean(&tree_residuals);
        let sequence_mae = Stats::mean_abs(&sequence_residuals);
        let tree_mae = Stats::mean_abs(&tree_residuals);

        let total_error = sequence_mae + tree_mae;
        let (state, outcome) = if total_error > 0.0 {
            (
                EnsembleState {
                    sequence_weight: tree_mae / total_error,
                    tree_weight: sequence_mae / total_error,
                    sequence_bias,
                    tree_bias,
                    ..*current
                },
                CalibrationOutcome::Reweighted,
            )
        } else {
            warn!("Calibration: both models have zero error, keeping current weights");
            (
                current.with_biases(sequence_bias, tree_bias),
                CalibrationOutcome::DegenerateCalibration,
            )
        };

        info!(
            "Calibrated weights - LSTM: {:.3}, XGBoost: {:.3}",
            state.sequence_weight, state.tree_weight
        );
        info!(
            "Bias corrections - LSTM: {:.3}, XGBoost: {:.3}",
            state.sequence_bias, state.tree_bias
        );

        Ok(Calibration {
            state,
            outcome,
            sequence_mae,
            tree_mae,
        })
    }
}

/// `actual - prediction` for each step.
fn residuals(preds: &[f64], actuals: &[f64]) -> Vec<f64> {
    actuals.iter().zip(preds).map(|(a, p)| a - p).collect()
}

pub(crate) fn check_series(a: &[f64], b: &[f64], actuals: &[f64]) -> ForecastResult<()> {
    if actuals.is_empty() {
        return Err(ForecastError::InsufficientData {
            required: 1,
            available: 0,
        });
    }
    if a.len() != actuals.len() {
        return Err(ForecastError::shape(
            "sequence predictions vs actuals",
            actuals.len(),
            a.len(),
        ));
    }
    if b.len() != actuals.len() {
        return Err(ForecastError::shape(
            "tree predictions vs actuals",
            actuals.len(),
            b.len(),
        ));
    }
    Ok(())
}
