use crate::domain::ensemble::calibration::check_series;
use crate::domain::ensemble::{Direction, EnsembleCombiner, EnsembleState};
use crate::domain::errors::{ForecastError, ForecastResult};
use serde::{Deserialize, Serialize};

/// Aggregate accuracy of a walk-forward backtest.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BacktestMetrics {
    /// Percentage of steps whose predicted direction matched the realized one
    pub direction_accuracy: f64,
    pub mae: f64,
    pub rmse: f64,
    /// Total absolute error relative to the mean actual price, in percent
    pub mape: f64,
}

/// One replayed day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktestStep {
    pub current_price: f64,
    pub predicted: f64,
    pub actual: f64,
    pub error: f64,
    pub predicted_direction: Direction,
    pub actual_direction: Direction,
    pub direction_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub metrics: BacktestMetrics,
    pub steps: Vec<BacktestStep>,
}

impl BacktestReport {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Replays historical prediction pairs day by day through the ensemble.
///
/// The reference price for day `i` is the actual price of day `i - 1`
/// (`initial_price` on the first day). Volatility is not used, so confidence
/// plays no part in the metrics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Backtester {
    combiner: EnsembleCombiner,
}

impl Backtester {
    pub fn new(state: EnsembleState) -> Self {
        Self {
            combiner: EnsembleCombiner::new(state),
        }
    }

    /// Weights `w` / `1 - w`, default threshold, no bias corrections.
    pub fn with_sequence_weight(sequence_weight: f64) -> Self {
        Self::new(EnsembleState::with_sequence_weight(sequence_weight))
    }

    pub fn state(&self) -> &EnsembleState {
        self.combiner.state()
    }

    pub fn run(
        &self,
        sequence_preds: &[f64],
        tree_preds: &[f64],
        actuals: &[f64],
        initial_price: f64,
    ) -> ForecastResult<BacktestReport> {
        check_series(sequence_preds, tree_preds, actuals)?;

        let threshold = self.state().neutral_threshold;
        let previous: Vec<f64> = std::iter::once(initial_price)
            .chain(actuals[..actuals.len() - 1].iter().copied())
            .collect();

        let mut steps = Vec::with_capacity(actuals.len());
        for (((&a, &b), &actual), &current) in sequence_preds
            .iter()
            .zip(tree_preds)
            .zip(actuals)
            .zip(&previous)
        {
            let result = self.combiner.predict(a, b, current, None)?;

            let realized = actual - current;
            let actual_direction =
                Direction::classify(realized, realized / current * 100.0, threshold);
            let error = (result.predicted_price - actual).abs();

            steps.push(BacktestStep {
                current_price: current,
                predicted: result.predicted_price,
                actual,
                error,
                predicted_direction: result.direction,
                actual_direction,
                direction_correct: result.direction == actual_direction,
            });
        }

        let metrics = summarize(&steps, actuals)?;
        Ok(BacktestReport { metrics, steps })
    }
}

fn summarize(steps: &[BacktestStep], actuals: &[f64]) -> ForecastResult<BacktestMetrics> {
    let n = steps.len() as f64;
    let correct = steps.iter().filter(|s| s.direction_correct).count() as f64;
    let total_abs: f64 = steps.iter().map(|s| s.error).sum();
    let total_sq: f64 = steps.iter().map(|s| s.error * s.error).sum();

    let mean_actual = actuals.iter().sum::<f64>() / actuals.len() as f64;
    if mean_actual == 0.0 {
        return Err(ForecastError::DivideByZero {
            quantity: "mean absolute percentage error",
        });
    }

    Ok(BacktestMetrics {
        direction_accuracy: correct / n * 100.0,
        mae: total_abs / n,
        rmse: (total_sq / n).sqrt(),
        mape: total_abs / mean_actual * 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_day_scenario() {
        let report = Backtester::default()
            .run(&[152.0, 150.0], &[151.5, 149.5], &[151.0, 149.0], 150.0)
            .unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report.steps[0].current_price, 150.0);
        assert_eq!(report.steps[1].current_price, 151.0);
        assert_eq!(report.steps[0].predicted, 151.8);
        assert_eq!(report.steps[1].predicted, 149.8);
        assert_eq!(report.steps[0].actual_direction, Direction::Up);
        assert_eq!(report.steps[1].actual_direction, Direction::Down);

        let m = report.metrics;
        assert!((m.direction_accuracy - 100.0).abs() < 1e-9);
        assert!((m.mae - 0.8).abs() < 1e-9);
        assert!((m.rmse - 0.8).abs() < 1e-9);
        assert!((m.mape - 1.6 / 150.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_small_realized_move_is_neutral() {
        // predicted +2%, realized +0.2%
        let report = Backtester::default()
            .run(&[102.0], &[102.0], &[100.2], 100.0)
            .unwrap();
        let step = report.steps[0];
        assert_eq!(step.predicted_direction, Direction::Up);
        assert_eq!(step.actual_direction, Direction::Neutral);
        assert!(!step.direction_correct);
        assert_eq!(report.metrics.direction_accuracy, 0.0);
    }

    #[test]
    fn test_error_uses_rounded_prediction() {
        // combined 100.004 rounds to 100.0
        let report = Backtester::with_sequence_weight(1.0)
            .run(&[100.004], &[0.0], &[100.0], 99.0)
            .unwrap();
        assert_eq!(report.steps[0].error, 0.0);
    }

    #[test]
    fn test_custom_weights() {
        let tree_only = Backtester::with_sequence_weight(0.0);
        assert_eq!(tree_only.state().tree_weight, 1.0);

        let report = tree_only
            .run(&[200.0, 200.0], &[101.0, 102.0], &[101.0, 102.0], 100.0)
            .unwrap();
        assert!(report.metrics.mae < 1e-9);
        assert_eq!(report.metrics.direction_accuracy, 100.0);
    }

    #[test]
    fn test_invalid_series() {
        let bt = Backtester::default();
        assert!(matches!(
            bt.run(&[], &[], &[], 100.0),
            Err(ForecastError::InsufficientData { .. })
        ));
        assert!(matches!(
            bt.run(&[1.0, 2.0], &[1.0], &[1.0, 2.0], 100.0),
            Err(ForecastError::ShapeError { .. })
        ));
        assert!(matches!(
            bt.run(&[1.0], &[1.0], &[1.0], 0.0),
            Err(ForecastError::DivideByZero { .. })
        ));
    }
}
