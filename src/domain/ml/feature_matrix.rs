use crate::domain::errors::{ForecastError, ForecastResult};
use crate::domain::ml::feature_registry::CLOSE_COLUMN;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis, s};
use tracing::debug;

/// Ordered rows of named numeric features.
///
/// Column order is fixed for the lifetime of the matrix and `Close` must be
/// present. [`FeatureMatrix::new`] accepts any values, while
/// [`FeatureMatrix::from_rows`] and [`FeatureMatrix::select_columns`] only
/// keep rows where every value is finite.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    values: Array2<f64>,
    close_index: usize,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> ForecastResult<Self> {
        if values.ncols() != columns.len() {
            return Err(ForecastError::shape(
                "feature matrix columns",
                columns.len(),
                values.ncols(),
            ));
        }
        let close_index = columns
            .iter()
            .position(|c| c == CLOSE_COLUMN)
            .ok_or_else(|| ForecastError::MissingColumn {
                column: CLOSE_COLUMN.to_string(),
            })?;

        Ok(Self {
            columns,
            values,
            close_index,
        })
    }

    /// Builds a matrix from raw rows, dropping every row that has a missing
    /// or non-finite value.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Option<f64>>>) -> ForecastResult<Self> {
        let n_columns = columns.len();
        let total = rows.len();
        let mut flat = Vec::with_capacity(total * n_columns);
        let mut kept = 0;

        for row in rows {
            if row.len() != n_columns {
                return Err(ForecastError::shape("feature row", n_columns, row.len()));
            }
            if row.iter().all(|v| v.is_some_and(f64::is_finite)) {
                flat.extend(row.into_iter().flatten());
                kept += 1;
            }
        }

        if kept < total {
            debug!("Dropped {} of {} rows with missing values", total - kept, total);
        }

        let flat_len = flat.len();
        let values = Array2::from_shape_vec((kept, n_columns), flat).map_err(|_| {
            ForecastError::shape("feature matrix values", kept * n_columns, flat_len)
        })?;
        Self::new(columns, values)
    }

    /// Same columns, new values. Used for the scaled counterpart of a matrix.
    pub fn with_values(&self, values: Array2<f64>) -> ForecastResult<Self> {
        Self::new(self.columns.clone(), values)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn close_index(&self) -> usize {
        self.close_index
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.index_axis(Axis(1), index)
    }

    pub fn close_prices(&self) -> Vec<f64> {
        self.column(self.close_index).to_vec()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.close_prices().last().copied()
    }

    /// Projection onto `names`, in the given order. Rows that are not finite
    /// in every selected column are dropped.
    pub fn select_columns(&self, names: &[String]) -> ForecastResult<Self> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| ForecastError::MissingColumn {
                        column: name.clone(),
                    })
            })
            .collect::<ForecastResult<Vec<usize>>>()?;
        Self::new(names.to_vec(), self.values.select(Axis(1), &indices))
            .map(|projected| projected.drop_incomplete_rows())
    }

    /// Keeps only the rows whose values are all finite.
    pub fn drop_incomplete_rows(self) -> Self {
        let keep: Vec<usize> = self
            .values
            .outer_iter()
            .enumerate()
            .filter(|(_, row)| row.iter().all(|v| v.is_finite()))
            .map(|(i, _)| i)
            .collect();
        if keep.len() == self.len() {
            return self;
        }

        debug!(
            "Dropped {} of {} rows with non-finite values",
            self.len() - keep.len(),
            self.len()
        );
        Self {
            values: self.values.select(Axis(0), &keep),
            ..self
        }
    }

    /// The most recent `n` rows, or `None` if fewer are available.
    pub fn tail(&self, n: usize) -> Option<ArrayView2<'_, f64>> {
        let len = self.len();
        if n > len {
            return None;
        }
        Some(self.values.slice(s![len - n.., ..]))
    }
}
