use crate::application::ml::{SequencePredictor, WindowPredictor};
use crate::domain::ensemble::{Calibration, EnsembleCombiner, EnsembleState, PredictionResult};
use crate::domain::errors::{ForecastError, ForecastResult};
use crate::domain::ml::feature_registry::{CLOSE_COLUMN, select_canonical_columns};
use crate::domain::ml::{
    FeatureMatrix, FittedScaler, FlattenWindower, FlattenedSet, MinMaxScaler, SequenceSet,
    SequenceWindower,
};
use crate::domain::performance::Stats;
use tracing::{debug, info};

/// Column holding the precomputed rolling return volatility, when present.
const VOLATILITY_COLUMN: &str = "Volatility";

/// Windowing parameters shared by training and inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub sequence_length: usize,
    pub prediction_horizon: usize,
    pub lookback: usize,
    /// Returns used when volatility has to be derived from Close prices
    pub volatility_window: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            sequence_length: 60,
            prediction_horizon: 1,
            lookback: 5,
            volatility_window: 20,
        }
    }
}

/// Model-ready data produced by [`ForecastPipeline::fit_transform`] or
/// [`ForecastPipeline::transform`].
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub scaled: FeatureMatrix,
    pub sequences: SequenceSet,
    pub windows: FlattenedSet,
    /// Sequence targets in price units
    pub sequence_target_prices: Vec<f64>,
    /// Window targets in price units
    pub window_target_prices: Vec<f64>,
}

/// Per-symbol forecasting state: fitted scaler, feature columns and ensemble.
///
/// Pipelines are never shared between symbols.
#[derive(Debug, Clone)]
pub struct ForecastPipeline {
    symbol: String,
    settings: PipelineSettings,
    scaler: Option<FittedScaler>,
    feature_columns: Vec<String>,
    ensemble: EnsembleState,
}

impl ForecastPipeline {
    pub fn new(symbol: impl Into<String>, settings: PipelineSettings) -> Self {
        Self {
            symbol: symbol.into(),
            settings,
            scaler: None,
            feature_columns: Vec::new(),
            ensemble: EnsembleState::default(),
        }
    }

    /// Rebuilds a fitted pipeline from persisted parts.
    pub fn restore(
        symbol: impl Into<String>,
        settings: PipelineSettings,
        scaler: FittedScaler,
        feature_columns: Vec<String>,
        ensemble: EnsembleState,
    ) -> ForecastResult<Self> {
        if scaler.n_columns() != feature_columns.len() {
            return Err(ForecastError::shape(
                "restored scaler columns",
                feature_columns.len(),
                scaler.n_columns(),
            ));
        }
        Ok(Self {
            symbol: symbol.into(),
            settings,
            scaler: Some(scaler),
            feature_columns,
            ensemble,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn ensemble(&self) -> &EnsembleState {
        &self.ensemble
    }

    pub fn is_fitted(&self) -> bool {
        self.scaler.is_some()
    }

    pub fn scaler(&self) -> ForecastResult<&FittedScaler> {
        self.scaler.as_ref().ok_or(ForecastError::NotFitted)
    }

    pub fn set_ensemble(&mut self, state: EnsembleState) {
        self.ensemble = state;
    }

    /// Swaps in a freshly calibrated ensemble state.
    pub fn apply_calibration(&mut self, calibration: &Calibration) {
        self.ensemble = calibration.state;
    }

    /// Selects the canonical feature columns, fits the scaler on them and
    /// windows the scaled matrix for both models.
    pub fn fit_transform(&mut self, raw: &FeatureMatrix) -> ForecastResult<PreparedData> {
        let columns = select_canonical_columns(raw.columns());
        let features = raw.select_columns(&columns)?;
        let scaler = MinMaxScaler::fit(&features)?;

        info!(
            "{}: fitted scaler on {} rows x {} features",
            self.symbol,
            features.len(),
            columns.len()
        );

        self.feature_columns = columns;
        self.scaler = Some(scaler);
        self.prepare(&features)
    }

    /// Scales and windows new data with the already fitted scaler.
    pub fn transform(&self, raw: &FeatureMatrix) -> ForecastResult<PreparedData> {
        let features = self.project(raw)?;
        self.prepare(&features)
    }

    /// Maps scaled Close values back to prices.
    pub fn inverse_scale_price(&self, scaled: &[f64]) -> ForecastResult<Vec<f64>> {
        let close = self.close_index()?;
        self.scaler()?.inverse_transform_column(scaled, close)
    }

    /// Runs both models on the most recent rows of `raw` and combines their
    /// predictions for the next step.
    pub fn forecast(
        &self,
        raw: &FeatureMatrix,
        sequence_model: &dyn SequencePredictor,
        window_model: &dyn WindowPredictor,
    ) -> ForecastResult<PredictionResult> {
        let features = self.project(raw)?;
        let scaled = self.scaler()?.transform(&features)?;

        let sequence = SequenceWindower::new(
            self.settings.sequence_length,
            self.settings.prediction_horizon,
        );
        let flatten = FlattenWindower::new(&self.feature_columns, self.settings.lookback);

        let sequence_scaled = sequence_model
            .predict(sequence.latest(&scaled)?)
            .map_err(|reason| model_error(sequence_model.name(), reason))?;
        let window_scaled = window_model
            .predict(flatten.latest(&scaled)?.view())
            .map_err(|reason| model_error(window_model.name(), reason))?;

        let prices = self.inverse_scale_price(&[sequence_scaled, window_scaled])?;
        let current_price = features.last_close().ok_or(ForecastError::InsufficientData {
            required: 1,
            available: 0,
        })?;
        let volatility = self.recent_volatility(&features);

        debug!(
            "{}: {} -> {:.4}, {} -> {:.4}, current {:.4}, volatility {:?}",
            self.symbol,
            sequence_model.name(),
            prices[0],
            window_model.name(),
            prices[1],
            current_price,
            volatility
        );

        self.predict_prices(prices[0], prices[1], current_price, volatility)
    }

    /// Combines two model predictions already in price units.
    pub fn predict_prices(
        &self,
        sequence_price: f64,
        tree_price: f64,
        current_price: f64,
        volatility: Option<f64>,
    ) -> ForecastResult<PredictionResult> {
        EnsembleCombiner::new(self.ensemble).predict(
            sequence_price,
            tree_price,
            current_price,
            volatility,
        )
    }

    /// Latest value of the `Volatility` feature, falling back to the
    /// standard deviation of recent Close returns.
    pub fn recent_volatility(&self, features: &FeatureMatrix) -> Option<f64> {
        let from_column = features
            .column_index(VOLATILITY_COLUMN)
            .and_then(|i| {
                let column = features.column(i);
                column.len().checked_sub(1).map(|last| column[last])
            })
            .filter(|v| v.is_finite());

        from_column.or_else(|| {
            Stats::return_volatility(&features.close_prices(), self.settings.volatility_window)
        })
    }

    fn close_index(&self) -> ForecastResult<usize> {
        let scaler = self.scaler()?;
        self.feature_columns
            .iter()
            .position(|c| c == CLOSE_COLUMN)
            .filter(|&i| i < scaler.n_columns())
            .ok_or(ForecastError::MissingColumn {
                column: CLOSE_COLUMN.to_string(),
            })
    }

    fn project(&self, raw: &FeatureMatrix) -> ForecastResult<FeatureMatrix> {
        if !self.is_fitted() {
            return Err(ForecastError::NotFitted);
        }
        raw.select_columns(&self.feature_columns)
    }

    fn prepare(&self, features: &FeatureMatrix) -> ForecastResult<PreparedData> {
        let scaled = self.scaler()?.transform(features)?;

        let sequences = SequenceWindower::new(
            self.settings.sequence_length,
            self.settings.prediction_horizon,
        )
        .build(&scaled);
        let windows =
            FlattenWindower::new(&self.feature_columns, self.settings.lookback).build(&scaled)?;

        let sequence_target_prices = self.inverse_scale_price(&sequences.targets.to_vec())?;
        let window_target_prices = self.inverse_scale_price(&windows.targets.to_vec())?;

        debug!(
            "{}: {} sequences, {} flattened windows",
            self.symbol,
            sequences.len(),
            windows.len()
        );

        Ok(PreparedData {
            scaled,
            sequences,
            windows,
            sequence_target_prices,
            window_target_prices,
        })
    }
}

fn model_error(model: &str, reason: String) -> ForecastError {
    ForecastError::Model {
        model: model.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::{LastCloseSequencePredictor, LastCloseWindowPredictor};
    use crate::domain::ensemble::Direction;
    use ndarray::Array2;

    fn matrix(rows: usize) -> FeatureMatrix {
        // Extra non-canonical column first, to exercise projection
        let columns: Vec<String> = ["Date_Ordinal", "Open", "High", "Low", "Close", "Volume"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let values = Array2::from_shape_fn((rows, 6), |(r, c)| match c {
            0 => r as f64,
            5 => 1000.0 + r as f64,
            _ => 100.0 + r as f64 + c as f64 * 0.1,
        });
        FeatureMatrix::new(columns, values).unwrap()
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            sequence_length: 4,
            prediction_horizon: 1,
            lookback: 2,
            volatility_window: 20,
        }
    }

    #[test]
    fn test_unfitted_pipeline() {
        let pipeline = ForecastPipeline::new("AAPL", settings());
        assert!(matches!(pipeline.scaler(), Err(ForecastError::NotFitted)));
        assert!(matches!(
            pipeline.inverse_scale_price(&[0.5]),
            Err(ForecastError::NotFitted)
        ));
        assert!(matches!(
            pipeline.transform(&matrix(10)),
            Err(ForecastError::NotFitted)
        ));
    }

    #[test]
    fn test_fit_transform_shapes_and_targets() {
        let mut pipeline = ForecastPipeline::new("AAPL", settings());
        let data = pipeline.fit_transform(&matrix(10)).unwrap();

        assert_eq!(pipeline.feature_columns().len(), 5);
        assert_eq!(pipeline.feature_columns()[3], "Close");
        assert_eq!(data.sequences.len(), 10 - 4 - 1 + 1);
        assert_eq!(data.windows.len(), 10 - 2 - 1);
        assert_eq!(data.windows.feature_names.len(), 10);

        // First sequence target is row 4, Close = 100 + 4 + 0.4
        assert!((data.sequence_target_prices[0] - 104.4).abs() < 1e-9);
        // First window target is row 2
        assert!((data.window_target_prices[0] - 102.4).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_rows_never_reach_the_models() {
        let mut raw = matrix(12);
        let mut values = raw.values().to_owned();
        values[[6, 2]] = f64::NAN;
        raw = raw.with_values(values).unwrap();

        let mut pipeline = ForecastPipeline::new("AAPL", settings());
        let data = pipeline.fit_transform(&raw).unwrap();
        assert_eq!(data.scaled.len(), 11);
        assert_eq!(data.sequences.len(), 11 - 4 - 1 + 1);
        assert!(data.sequences.sequences.iter().all(|v| v.is_finite()));
        assert!(data.windows.windows.iter().all(|v| v.is_finite()));
        assert!(data.sequence_target_prices.iter().all(|v| v.is_finite()));

        let transformed = pipeline.transform(&raw).unwrap();
        assert_eq!(transformed.scaled.len(), 11);

        // A missing latest Close falls back to the last complete row
        let mut latest = raw.values().to_owned();
        latest[[11, 4]] = f64::NAN;
        let result = pipeline
            .forecast(
                &raw.with_values(latest).unwrap(),
                &LastCloseSequencePredictor::new(3),
                &LastCloseWindowPredictor::new(5, 3),
            )
            .unwrap();
        assert_eq!(result.current_price, 110.4);
        assert!(result.predicted_price.is_finite());
    }

    #[test]
    fn test_inverse_scale_price_round_trip() {
        let mut pipeline = ForecastPipeline::new("AAPL", settings());
        let data = pipeline.fit_transform(&matrix(10)).unwrap();

        let scaled_close: Vec<f64> = data.scaled.close_prices();
        let prices = pipeline.inverse_scale_price(&scaled_close).unwrap();
        for (r, p) in prices.iter().enumerate() {
            assert!((p - (100.4 + r as f64)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_forecast_with_baselines() {
        let mut pipeline = ForecastPipeline::new("AAPL", settings());
        pipeline.fit_transform(&matrix(10)).unwrap();

        let result = pipeline
            .forecast(
                &matrix(10),
                &LastCloseSequencePredictor::new(3),
                &LastCloseWindowPredictor::new(5, 3),
            )
            .unwrap();

        // Both baselines repeat the last Close
        assert!((result.predicted_price - 109.4).abs() < 1e-9);
        assert_eq!(result.direction, Direction::Neutral);
        assert_eq!(result.current_price, 109.4);
    }

    #[test]
    fn test_forecast_needs_a_full_sequence() {
        let mut pipeline = ForecastPipeline::new("AAPL", settings());
        pipeline.fit_transform(&matrix(10)).unwrap();

        let result = pipeline.forecast(
            &matrix(3),
            &LastCloseSequencePredictor::new(3),
            &LastCloseWindowPredictor::new(5, 3),
        );
        assert!(matches!(
            result,
            Err(ForecastError::InsufficientData {
                required: 4,
                available: 3
            })
        ));
    }

    #[test]
    fn test_model_failure_is_reported() {
        struct Failing;
        impl SequencePredictor for Failing {
            fn predict(&self, _sequence: ndarray::ArrayView2<f64>) -> Result<f64, String> {
                Err("session not loaded".to_string())
            }
            fn name(&self) -> &str {
                "failing"
            }
            fn version(&self) -> &str {
                "0"
            }
        }

        let mut pipeline = ForecastPipeline::new("AAPL", settings());
        pipeline.fit_transform(&matrix(10)).unwrap();
        let result = pipeline.forecast(&matrix(10), &Failing, &LastCloseWindowPredictor::new(5, 3));

        match result {
            Err(ForecastError::Model { model, reason }) => {
                assert_eq!(model, "failing");
                assert_eq!(reason, "session not loaded");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_volatility_falls_back_to_returns() {
        let pipeline = ForecastPipeline::new("AAPL", settings());
        let raw = matrix(10);
        let features = raw
            .select_columns(&select_canonical_columns(raw.columns()))
            .unwrap();
        let vol = pipeline.recent_volatility(&features).unwrap();
        assert!(vol > 0.0);
    }

    #[test]
    fn test_volatility_column_takes_precedence() {
        let columns: Vec<String> = ["Close", "Volatility"].iter().map(|s| s.to_string()).collect();
        let values = Array2::from_shape_fn((5, 2), |(r, c)| if c == 0 { 100.0 + r as f64 } else { 0.03 });
        let features = FeatureMatrix::new(columns, values).unwrap();

        let pipeline = ForecastPipeline::new("AAPL", settings());
        assert_eq!(pipeline.recent_volatility(&features), Some(0.03));
    }

    #[test]
    fn test_restore_checks_columns() {
        let mut fitted = ForecastPipeline::new("AAPL", settings());
        fitted.fit_transform(&matrix(10)).unwrap();
        let scaler = fitted.scaler().unwrap().clone();

        let restored = ForecastPipeline::restore(
            "AAPL",
            settings(),
            scaler.clone(),
            fitted.feature_columns().to_vec(),
            EnsembleState::default(),
        );
        assert!(restored.is_ok());

        let bad = ForecastPipeline::restore(
            "AAPL",
            settings(),
            scaler,
            vec!["Close".to_string()],
            EnsembleState::default(),
        );
        assert!(matches!(bad, Err(ForecastError::ShapeError { .. })));
    }
}
