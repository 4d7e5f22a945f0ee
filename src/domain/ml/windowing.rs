//! Slicing a scaled feature matrix into model inputs.
//!
//! Both windowers are pure: the same matrix always yields the same windows,
//! earliest first. Short histories produce empty sets, never errors.

use crate::domain::errors::{ForecastError, ForecastResult};
use crate::domain::ml::feature_matrix::FeatureMatrix;
use crate::domain::ml::feature_registry::flattened_feature_names;
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Axis, s};

/// Overlapping sequences for the sequence model, shape `(n, sequence_length, n_features)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceSet {
    pub sequences: Array3<f64>,
    pub targets: Array1<f64>,
    /// Row index of each target in the source matrix.
    pub target_rows: Vec<usize>,
}

impl SequenceSet {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn sequence(&self, index: usize) -> ArrayView2<'_, f64> {
        self.sequences.index_axis(Axis(0), index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceWindower {
    sequence_length: usize,
    prediction_horizon: usize,
}

impl SequenceWindower {
    /// Zero lengths are raised to 1. Configuration rejects them before
    /// they get here.
    pub fn new(sequence_length: usize, prediction_horizon: usize) -> Self {
        Self {
            sequence_length: sequence_length.max(1),
            prediction_horizon: prediction_horizon.max(1),
        }
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn prediction_horizon(&self) -> usize {
        self.prediction_horizon
    }

    /// Rows needed to emit a single sequence with its target.
    pub fn min_rows(&self) -> usize {
        self.sequence_length + self.prediction_horizon
    }

    /// Sequence `i` covers rows `i..i+L`; its target is the Close of row
    /// `i + L + H - 1`, i.e. `H` steps after the sequence's last row.
    pub fn build(&self, matrix: &FeatureMatrix) -> SequenceSet {
        let len = matrix.len();
        let n_features = matrix.n_columns();
        let (l, h) = (self.sequence_length, self.prediction_horizon);
        let count = (len + 1).saturating_sub(l + h);

        let values = matrix.values();
        let close = matrix.close_index();
        let mut sequences = Array3::zeros((count, l, n_features));
        let mut targets = Array1::zeros(count);
        let mut target_rows = Vec::with_capacity(count);

        for i in 0..count {
            sequences
                .index_axis_mut(Axis(0), i)
                .assign(&values.slice(s![i..i + l, ..]));
            let target_row = i + l + h - 1;
            targets[i] = values[[target_row, close]];
            target_rows.push(target_row);
        }

        SequenceSet {
            sequences,
            targets,
            target_rows,
        }
    }

    /// The most recent `sequence_length` rows, used as inference input.
    pub fn latest<'a>(&self, matrix: &'a FeatureMatrix) -> ForecastResult<ArrayView2<'a, f64>> {
        matrix
            .tail(self.sequence_length)
            .ok_or(ForecastError::InsufficientData {
                required: self.sequence_length,
                available: matrix.len(),
            })
    }
}

/// Flattened lookback windows for the tree model, shape `(n, lookback * n_features)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedSet {
    pub windows: Array2<f64>,
    pub targets: Array1<f64>,
    pub target_rows: Vec<usize>,
    pub feature_names: Vec<String>,
}

impl FlattenedSet {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn window(&self, index: usize) -> ArrayView1<'_, f64> {
        self.windows.row(index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenWindower {
    lookback: usize,
    source_columns: Vec<String>,
    flattened_names: Vec<String>,
}

impl FlattenWindower {
    /// A zero lookback is raised to 1.
    pub fn new(feature_names: &[String], lookback: usize) -> Self {
        let lookback = lookback.max(1);
        Self {
            lookback,
            source_columns: feature_names.to_vec(),
            flattened_names: flattened_feature_names(feature_names, lookback),
        }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    pub fn flattened_names(&self) -> &[String] {
        &self.flattened_names
    }

    /// Window `i` (for `i` in `lookback..=len-2`) flattens rows `i-lookback..i`
    /// oldest first; its target is the Close of row `i`.
    pub fn build(&self, matrix: &FeatureMatrix) -> ForecastResult<FlattenedSet> {
        self.check_columns(matrix)?;

        let len = matrix.len();
        let width = self.flattened_names.len();
        let count = len.saturating_sub(self.lookback + 1);

        let values = matrix.values();
        let close = matrix.close_index();
        let mut windows = Array2::zeros((count, width));
        let mut targets = Array1::zeros(count);
        let mut target_rows = Vec::with_capacity(count);

        for (n, i) in (self.lookback..self.lookback + count).enumerate() {
            windows
                .row_mut(n)
                .assign(&flatten(values.slice(s![i - self.lookback..i, ..])));
            targets[n] = values[[i, close]];
            target_rows.push(i);
        }

        Ok(FlattenedSet {
            windows,
            targets,
            target_rows,
            feature_names: self.flattened_names.clone(),
        })
    }

    /// The most recent `lookback` rows flattened, used as inference input.
    pub fn latest(&self, matrix: &FeatureMatrix) -> ForecastResult<Array1<f64>> {
        self.check_columns(matrix)?;
        let rows = matrix
            .tail(self.lookback)
            .ok_or(ForecastError::InsufficientData {
                required: self.lookback,
                available: matrix.len(),
            })?;
        Ok(flatten(rows))
    }

    fn check_columns(&self, matrix: &FeatureMatrix) -> ForecastResult<()> {
        if matrix.columns() != self.source_columns.as_slice() {
            return Err(ForecastError::shape(
                "flatten window columns",
                self.source_columns.len(),
                matrix.n_columns(),
            ));
        }
        Ok(())
    }
}

/// Row-major flattening; `iter` walks logical order regardless of memory layout.
fn flatten(rows: ArrayView2<'_, f64>) -> Array1<f64> {
    rows.iter().copied().collect()
}
