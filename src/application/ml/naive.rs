use super::predictor::{PredictorFactory, SequencePredictor, WindowPredictor};
use crate::domain::ml::feature_registry::{CLOSE_COLUMN, CLOSE_INDEX};
use ndarray::{ArrayView1, ArrayView2};

/// Persistence baseline for the sequence slot: tomorrow's Close is the last
/// observed Close of the input sequence.
///
/// Used when no trained model is wired in, and as the reference a real model
/// has to beat.
#[derive(Debug, Clone, Copy)]
pub struct LastCloseSequencePredictor {
    close_index: usize,
}

impl LastCloseSequencePredictor {
    pub fn new(close_index: usize) -> Self {
        Self { close_index }
    }
}

impl SequencePredictor for LastCloseSequencePredictor {
    fn predict(&self, sequence: ArrayView2<f64>) -> Result<f64, String> {
        let last = sequence
            .nrows()
            .checked_sub(1)
            .ok_or("Empty input sequence")?;
        sequence
            .get((last, self.close_index))
            .copied()
            .ok_or_else(|| format!("Close index {} out of range", self.close_index))
    }

    fn name(&self) -> &str {
        "Last Close (sequence baseline)"
    }

    fn version(&self) -> &str {
        "v1"
    }
}

/// Persistence baseline for the flattened-window slot.
#[derive(Debug, Clone, Copy)]
pub struct LastCloseWindowPredictor {
    n_features: usize,
    close_index: usize,
}

impl LastCloseWindowPredictor {
    pub fn new(n_features: usize, close_index: usize) -> Self {
        Self {
            n_features,
            close_index,
        }
    }
}

impl WindowPredictor for LastCloseWindowPredictor {
    fn predict(&self, window: ArrayView1<f64>) -> Result<f64, String> {
        if self.close_index >= self.n_features || window.len() < self.n_features {
            return Err(format!(
                "Window of {} values does not hold a row of {} features",
                window.len(),
                self.n_features
            ));
        }
        // Newest row sits at the end of the flattened window
        Ok(window[window.len() - self.n_features + self.close_index])
    }

    fn name(&self) -> &str {
        "Last Close (window baseline)"
    }

    fn version(&self) -> &str {
        "v1"
    }
}

/// Hands out the last-close baselines for any symbol.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineFactory;

impl PredictorFactory for BaselineFactory {
    fn sequence_model(&self, _symbol: &str, columns: &[String]) -> Box<dyn SequencePredictor> {
        Box::new(LastCloseSequencePredictor::new(close_position(columns)))
    }

    fn window_model(&self, _symbol: &str, columns: &[String]) -> Box<dyn WindowPredictor> {
        Box::new(LastCloseWindowPredictor::new(
            columns.len(),
            close_position(columns),
        ))
    }
}

fn close_position(columns: &[String]) -> usize {
    columns
        .iter()
        .position(|c| c == CLOSE_COLUMN)
        .unwrap_or(CLOSE_INDEX)
}
