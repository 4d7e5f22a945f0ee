use serde::{Deserialize, Serialize};

/// Weights, neutral threshold and bias corrections of the two-model ensemble.
///
/// Serialized with the `ensemble_config.json` key names. Changed only by
/// calibration or by loading a persisted config; the caller swaps the whole
/// value, never individual fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleState {
    #[serde(rename = "lstm_weight")]
    pub sequence_weight: f64,
    #[serde(rename = "xgboost_weight")]
    pub tree_weight: f64,
    /// Minimum fractional move (0.005 = 0.5%) to call a direction.
    pub neutral_threshold: f64,
    #[serde(rename = "lstm_bias_correction", default)]
    pub sequence_bias: f64,
    #[serde(rename = "xgboost_bias_correction", default)]
    pub tree_bias: f64,
}

impl Default for EnsembleState {
    fn default() -> Self {
        Self {
            sequence_weight: 0.6,
            tree_weight: 0.4,
            neutral_threshold: 0.005,
            sequence_bias: 0.0,
            tree_bias: 0.0,
        }
    }
}

impl EnsembleState {
    pub fn new(sequence_weight: f64, tree_weight: f64, neutral_threshold: f64) -> Self {
        Self {
            sequence_weight: sequence_weight.max(0.0),
            tree_weight: tree_weight.max(0.0),
            neutral_threshold: neutral_threshold.max(0.0),
            ..Default::default()
        }
    }

    /// Complementary weights `w` and `1 - w`, default threshold, no bias.
    pub fn with_sequence_weight(sequence_weight: f64) -> Self {
        let w = sequence_weight.clamp(0.0, 1.0);
        Self::new(w, 1.0 - w, Self::default().neutral_threshold)
    }

    pub fn with_biases(self, sequence_bias: f64, tree_bias: f64) -> Self {
        Self {
            sequence_bias,
            tree_bias,
            ..self
        }
    }
}
