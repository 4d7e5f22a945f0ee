use super::confidence::ConfidenceScorer;
use super::prediction::{Direction, PredictionResult, round2};
use super::state::EnsembleState;
use crate::domain::errors::{ForecastError, ForecastResult};

/// Unrounded outcome of combining two price predictions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Combination {
    /// Bias-corrected sequence-model price
    pub sequence_prediction: f64,
    /// Bias-corrected tree-model price
    pub tree_prediction: f64,
    pub combined: f64,
    pub change: f64,
    pub change_pct: f64,
    pub direction: Direction,
}

/// Weighted, bias-corrected combination of the two model predictions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnsembleCombiner {
    state: EnsembleState,
}

impl EnsembleCombiner {
    pub fn new(state: EnsembleState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &EnsembleState {
        &self.state
    }

    pub fn combine(
        &self,
        sequence_pred: f64,
        tree_pred: f64,
        current_price: f64,
    ) -> ForecastResult<Combination> {
        if current_price == 0.0 {
            return Err(ForecastError::DivideByZero {
                quantity: "price change percent",
            });
        }

        let sequence_prediction = sequence_pred + self.state.sequence_bias;
        let tree_prediction = tree_pred + self.state.tree_bias;
        let combined =
            self.state.sequence_weight * sequence_prediction + self.state.tree_weight * tree_prediction;

        let change = combined - current_price;
        let change_pct = change / current_price * 100.0;
        let direction = Direction::classify(change, change_pct, self.state.neutral_threshold);

        Ok(Combination {
            sequence_prediction,
            tree_prediction,
            combined,
            change,
            change_pct,
            direction,
        })
    }

    /// Combines both predictions and scores the result.
    ///
    /// `volatility` is optional recent return volatility for the confidence score.
    pub fn predict(
        &self,
        sequence_pred: f64,
        tree_pred: f64,
        current_price: f64,
        volatility: Option<f64>,
    ) -> ForecastResult<PredictionResult> {
        let c = self.combine(sequence_pred, tree_pred, current_price)?;
        let confidence = ConfidenceScorer::score(
            c.sequence_prediction,
            c.tree_prediction,
            current_price,
            volatility,
        );

        Ok(PredictionResult {
            predicted_price: round2(c.combined),
            direction: c.direction,
            confidence,
            sequence_prediction: round2(c.sequence_prediction),
            tree_prediction: round2(c.tree_prediction),
            current_price: round2(current_price),
            price_change: round2(c.change),
            price_change_percent: round2(c.change_pct),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_forecast() {
        let combiner = EnsembleCombiner::default();
        let result = combiner.predict(152.5, 151.8, 150.0, None).unwrap();

        assert_eq!(result.predicted_price, 152.22);
        assert_eq!(result.price_change, 2.22);
        assert_eq!(result.price_change_percent, 1.48);
        assert_eq!(result.direction, Direction::Up);
        assert_eq!(result.sequence_prediction, 152.5);
        assert_eq!(result.tree_prediction, 151.8);
        assert_eq!(result.current_price, 150.0);
    }

    #[test]
    fn test_bias_corrections_are_added() {
        let state = EnsembleState::default().with_biases(1.0, -2.0);
        let c = EnsembleCombiner::new(state)
            .combine(100.0, 100.0, 100.0)
            .unwrap();

        assert_eq!(c.sequence_prediction, 101.0);
        assert_eq!(c.tree_prediction, 98.0);
        assert!((c.combined - (0.6 * 101.0 + 0.4 * 98.0)).abs() < 1e-12);
    }

    #[test]
    fn test_small_move_is_neutral() {
        let result = EnsembleCombiner::default()
            .predict(100.3, 100.2, 100.0, None)
            .unwrap();
        assert_eq!(result.direction, Direction::Neutral);
    }

    #[test]
    fn test_downward_move() {
        let result = EnsembleCombiner::default()
            .predict(95.0, 96.0, 100.0, None)
            .unwrap();
        assert_eq!(result.direction, Direction::Down);
        assert!(result.price_change < 0.0);
    }

    #[test]
    fn test_zero_current_price() {
        let result = EnsembleCombiner::default().predict(1.0, 1.0, 0.0, None);
        assert!(matches!(result, Err(ForecastError::DivideByZero { .. })));
    }

    #[test]
    fn test_raising_threshold_never_creates_direction() {
        let inputs = [(100.3, 100.2, 100.0), (101.0, 99.5, 100.0), (150.0, 149.0, 150.0)];
        let thresholds = [0.0, 0.001, 0.003, 0.005, 0.01, 0.05];

        for (a, b, current) in inputs {
            let mut seen_neutral = false;
            for t in thresholds {
                let state = EnsembleState::new(0.6, 0.4, t);
                let direction = EnsembleCombiner::new(state)
                    .combine(a, b, current)
                    .unwrap()
                    .direction;
                if seen_neutral {
                    assert_eq!(direction, Direction::Neutral);
                }
                seen_neutral |= direction == Direction::Neutral;
            }
        }
    }
}
