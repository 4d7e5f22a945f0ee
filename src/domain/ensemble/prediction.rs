use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction label of a forecast (or of a realized move).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

impl Direction {
    /// Neutral when `|change_pct| < threshold * 100` (strict), otherwise by sign.
    ///
    /// A move exactly at the threshold is directional.
    pub fn classify(change: f64, change_pct: f64, neutral_threshold: f64) -> Self {
        if change_pct.abs() < neutral_threshold * 100.0 {
            Direction::Neutral
        } else if change > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final ensemble forecast. Produced fresh by every prediction, never mutated.
///
/// Numbers are rounded to 2 decimals for presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_price: f64,
    pub direction: Direction,
    /// 0 to 100
    pub confidence: f64,
    #[serde(rename = "lstm_prediction")]
    pub sequence_prediction: f64,
    #[serde(rename = "xgboost_prediction")]
    pub tree_prediction: f64,
    pub current_price: f64,
    pub price_change: f64,
    pub price_change_percent: f64,
}

/// Rounds to two decimals, ties to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}
