use super::prediction::round2;

const AGREEMENT_SENSITIVITY: f64 = 10.0;
const DIRECTION_BONUS: f64 = 0.1;
const VOLATILITY_BAND: f64 = 2.0;
const VOLATILITY_PENALTY: f64 = 0.8;

/// Confidence score (0 to 100) from model agreement, direction agreement and
/// the predicted move relative to recent volatility.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    /// `sequence_pred` and `tree_pred` are bias-corrected prices.
    /// `volatility` is the standard deviation of recent fractional returns.
    pub fn score(
        sequence_pred: f64,
        tree_pred: f64,
        current_price: f64,
        volatility: Option<f64>,
    ) -> f64 {
        let avg_prediction = (sequence_pred + tree_pred) / 2.0;
        let relative_diff = if avg_prediction > 0.0 {
            (sequence_pred - tree_pred).abs() / avg_prediction
        } else {
            0.0
        };
        let agreement = (1.0 - relative_diff * AGREEMENT_SENSITIVITY).max(0.0);

        // sign(0) is its own value: "no change" disagrees with any move
        let direction_bonus =
            if sign(sequence_pred - current_price) == sign(tree_pred - current_price) {
                DIRECTION_BONUS
            } else {
                -DIRECTION_BONUS
            };

        let volatility_factor = match volatility {
            Some(vol) if vol > 0.0 => {
                let predicted_change = (avg_prediction - current_price).abs();
                if predicted_change <= vol * current_price * VOLATILITY_BAND {
                    1.0
                } else {
                    VOLATILITY_PENALTY
                }
            }
            _ => 1.0,
        };

        let confidence = ((agreement + direction_bonus) * volatility_factor).clamp(0.0, 1.0);
        round2(confidence * 100.0)
    }
}

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_agreeing_predictions_saturate() {
        // agreement 0.954 + 0.1 bonus, clamped to 1
        let score = ConfidenceScorer::score(152.5, 151.8, 150.0, None);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_divergent_predictions_score_low() {
        // relative diff ~0.0645 -> agreement ~0.355, opposite directions
        let score = ConfidenceScorer::score(160.0, 150.0, 155.0, None);
        let expected = ((1.0 - 10.0 / 155.0 * 10.0) - 0.1) * 100.0;
        assert!((score - round2(expected)).abs() < 1e-9);
    }

    #[test]
    fn test_zero_change_counts_as_disagreement() {
        let flat = ConfidenceScorer::score(100.0, 100.2, 100.0, None);
        let both_up = ConfidenceScorer::score(100.1, 100.2, 100.0, None);
        assert!(flat < both_up);
        // agreement 1 - (0.2/100.1)*10, minus the bonus
        let expected = (1.0 - 0.2 / 100.1 * 10.0 - 0.1) * 100.0;
        assert!((flat - round2(expected)).abs() < 1e-9);
    }

    #[test]
    fn test_volatility_penalty() {
        // avg move 5 on 100 with 1% vol: outside the 2-sigma band, (1 + 0.1) * 0.8
        let calm = ConfidenceScorer::score(105.0, 105.0, 100.0, Some(0.01));
        let wide = ConfidenceScorer::score(105.0, 105.0, 100.0, Some(0.05));
        assert_eq!(calm, 88.0);
        assert_eq!(wide, 100.0);

        // zero volatility is treated as absent
        assert_eq!(ConfidenceScorer::score(105.0, 105.0, 100.0, Some(0.0)), 100.0);
    }

    #[test]
    fn test_non_positive_average_skips_relative_diff() {
        let score = ConfidenceScorer::score(-5.0, 3.0, 1.0, None);
        // agreement 1, directions differ
        assert_eq!(score, 90.0);
    }

    #[test]
    fn test_bounds() {
        let cases = [
            (0.0, 0.0, 1.0),
            (1.0, 1000.0, 50.0),
            (50.0, 50.0, 50.0),
            (-10.0, -20.0, 5.0),
            (1e9, 1.0, 1.0),
        ];
        for (a, b, current) in cases {
            for vol in [None, Some(0.001), Some(0.5)] {
                let score = ConfidenceScorer::score(a, b, current, vol);
                assert!((0.0..=100.0).contains(&score), "{} {} {} -> {}", a, b, current, score);
            }
        }
    }
}
