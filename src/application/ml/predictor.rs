use crate::domain::ml::{FlattenedSet, SequenceSet};
use ndarray::{ArrayView1, ArrayView2};

/// Interface for sequence models (LSTM-style) fed `(sequence_length, n_features)`
/// windows of scaled features.
pub trait SequencePredictor: Send + Sync {
    /// Predict the scaled Close price at the forecast horizon.
    fn predict(&self, sequence: ArrayView2<f64>) -> Result<f64, String>;

    /// Predict every sequence of a windowed set, earliest first.
    fn predict_batch(&self, set: &SequenceSet) -> Result<Vec<f64>, String> {
        (0..set.len())
            .map(|i| self.predict(set.sequence(i)))
            .collect()
    }

    /// Get model name/type
    fn name(&self) -> &str;

    /// Get model version/id
    fn version(&self) -> &str;
}

/// Interface for tabular models (gradient-boosted trees) fed flattened
/// lookback windows.
pub trait WindowPredictor: Send + Sync {
    /// Predict the scaled Close price of the next row.
    fn predict(&self, window: ArrayView1<f64>) -> Result<f64, String>;

    fn predict_batch(&self, set: &FlattenedSet) -> Result<Vec<f64>, String> {
        set.windows
            .rows()
            .into_iter()
            .map(|row| self.predict(row))
            .collect()
    }

    fn name(&self) -> &str;

    fn version(&self) -> &str;
}

/// Supplies the two models for a symbol, given the fitted feature columns.
///
/// Each call must hand out independent instances so symbols can run in
/// parallel without sharing model state.
pub trait PredictorFactory: Send + Sync {
    fn sequence_model(&self, symbol: &str, columns: &[String]) -> Box<dyn SequencePredictor>;

    fn window_model(&self, symbol: &str, columns: &[String]) -> Box<dyn WindowPredictor>;
}
