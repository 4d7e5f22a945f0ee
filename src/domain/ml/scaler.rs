//! Per-column min-max scaling.
//!
//! `MinMaxScaler::fit` is the only way to obtain a [`FittedScaler`], so
//! transforming with an unfitted scaler cannot be expressed.

use crate::domain::errors::{ForecastError, ForecastResult};
use crate::domain::ml::feature_matrix::FeatureMatrix;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Unfitted marker. Fitting yields a [`FittedScaler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MinMaxScaler;

impl MinMaxScaler {
    pub fn fit(matrix: &FeatureMatrix) -> ForecastResult<FittedScaler> {
        Self::fit_values(matrix.values())
    }

    pub fn fit_values(values: ArrayView2<'_, f64>) -> ForecastResult<FittedScaler> {
        if values.nrows() == 0 || values.ncols() == 0 {
            return Err(ForecastError::EmptyMatrix);
        }

        let data_min = values.fold_axis(Axis(0), f64::INFINITY, |acc, &v| acc.min(v));
        let data_max = values.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, &v| acc.max(v));
        let scale = Zip::from(&data_min)
            .and(&data_max)
            .map_collect(|&min, &max| scale_for_range(max - min));

        Ok(FittedScaler {
            data_min,
            data_max,
            scale,
        })
    }
}

/// Constant columns keep a unit scale so they map to zero instead of NaN.
fn scale_for_range(range: f64) -> f64 {
    if range == 0.0 { 1.0 } else { 1.0 / range }
}

/// Scaler state derived once from a fit matrix; immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedScaler {
    data_min: Array1<f64>,
    data_max: Array1<f64>,
    scale: Array1<f64>,
}

impl FittedScaler {
    pub fn n_columns(&self) -> usize {
        self.scale.len()
    }

    pub fn data_min(&self) -> &Array1<f64> {
        &self.data_min
    }

    pub fn data_max(&self) -> &Array1<f64> {
        &self.data_max
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    pub fn transform(&self, matrix: &FeatureMatrix) -> ForecastResult<FeatureMatrix> {
        let scaled = self.transform_values(matrix.values())?;
        matrix.with_values(scaled)
    }

    /// `scaled = (value - min) * scale`, column by column.
    pub fn transform_values(&self, values: ArrayView2<'_, f64>) -> ForecastResult<Array2<f64>> {
        self.check_columns("transform columns", values.ncols())?;
        Ok((&values - &self.data_min) * &self.scale)
    }

    pub fn inverse_transform_values(
        &self,
        values: ArrayView2<'_, f64>,
    ) -> ForecastResult<Array2<f64>> {
        self.check_columns("inverse transform columns", values.ncols())?;
        Ok(&values / &self.scale + &self.data_min)
    }

    /// Reconstructs original units for exactly one column.
    ///
    /// The other columns' real values are never needed; only valid because
    /// min-max scaling is columnwise independent.
    pub fn inverse_transform_column(
        &self,
        scaled: &[f64],
        column_index: usize,
    ) -> ForecastResult<Vec<f64>> {
        if column_index >= self.n_columns() {
            return Err(ForecastError::shape(
                "inverse transform column index",
                self.n_columns(),
                column_index,
            ));
        }
        let dummy = self.zero_filled_with_column(scaled, column_index);
        let restored = self.inverse_transform_values(dummy.view())?;
        Ok(restored.column(column_index).to_vec())
    }

    fn zero_filled_with_column(&self, scaled: &[f64], column_index: usize) -> Array2<f64> {
        let mut dummy = Array2::zeros((scaled.len(), self.n_columns()));
        dummy
            .column_mut(column_index)
            .assign(&ArrayView1::from(scaled));
        dummy
    }

    fn check_columns(&self, context: &str, actual: usize) -> ForecastResult<()> {
        if actual != self.n_columns() {
            return Err(ForecastError::shape(context, self.n_columns(), actual));
        }
        Ok(())
    }

    /// Parameters in the persisted `scaler_params.json` layout.
    ///
    /// `min_` is the additive offset (`-data_min * scale`), so
    /// `value * scale_ + min_` equals `(value - data_min_) * scale_`.
    pub fn params(&self) -> ScalerParams {
        ScalerParams {
            min: Zip::from(&self.data_min)
                .and(&self.scale)
                .map_collect(|&min, &scale| -min * scale)
                .to_vec(),
            scale: self.scale.to_vec(),
            data_min: self.data_min.to_vec(),
            data_max: self.data_max.to_vec(),
            data_range: Zip::from(&self.data_max)
                .and(&self.data_min)
                .map_collect(|&max, &min| max - min)
                .to_vec(),
        }
    }

    pub fn from_params(params: &ScalerParams) -> ForecastResult<Self> {
        let n = params.scale.len();
        if n == 0 {
            return Err(ForecastError::EmptyMatrix);
        }
        for (name, len) in [
            ("scaler min_", params.min.len()),
            ("scaler data_min_", params.data_min.len()),
            ("scaler data_max_", params.data_max.len()),
            ("scaler data_range_", params.data_range.len()),
        ] {
            if len != n {
                return Err(ForecastError::shape(name, n, len));
            }
        }

        Ok(Self {
            data_min: Array1::from(params.data_min.clone()),
            data_max: Array1::from(params.data_max.clone()),
            scale: Array1::from(params.scale.clone()),
        })
    }
}

/// Persisted scaler parameters, arrays in fitted column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    #[serde(rename = "min_")]
    pub min: Vec<f64>,
    #[serde(rename = "scale_")]
    pub scale: Vec<f64>,
    #[serde(rename = "data_min_")]
    pub data_min: Vec<f64>,
    #[serde(rename = "data_max_")]
    pub data_max: Vec<f64>,
    #[serde(rename = "data_range_")]
    pub data_range: Vec<f64>,
}
