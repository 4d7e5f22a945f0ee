use crate::application::evaluation::{EvaluationReport, EvaluationService};
use crate::application::ml::PredictorFactory;
use crate::application::pipeline::{ForecastPipeline, PipelineSettings};
use crate::domain::ensemble::{EnsembleState, PredictionResult};
use crate::domain::errors::ForecastResult;
use crate::domain::ml::FeatureMatrix;
use crate::domain::ml::feature_registry::select_canonical_columns;
use rayon::prelude::*;
use std::sync::Arc;

/// One symbol's input to a batch run.
#[derive(Debug, Clone)]
pub struct SymbolData {
    pub symbol: String,
    pub features: FeatureMatrix,
}

/// Evaluated pipeline for one symbol, ready to be persisted.
#[derive(Debug, Clone)]
pub struct SymbolEvaluation {
    pub pipeline: ForecastPipeline,
    pub report: EvaluationReport,
}

/// Result of a single symbol in a batch
#[derive(Debug, Clone)]
pub struct BatchResult<T> {
    pub symbol: String,
    pub result: Result<T, String>,
}

/// Parallel runner for multi-symbol evaluations and forecasts.
///
/// Every symbol gets its own pipeline and its own model instances, so
/// symbols never share scaler or ensemble state. Errors are captured per
/// symbol and returned alongside the successful results.
pub struct BatchForecaster {
    settings: PipelineSettings,
    initial_ensemble: EnsembleState,
    evaluation: EvaluationService,
    models: Arc<dyn PredictorFactory>,
}

impl BatchForecaster {
    pub fn new(
        settings: PipelineSettings,
        evaluation: EvaluationService,
        models: Arc<dyn PredictorFactory>,
    ) -> Self {
        Self {
            settings,
            initial_ensemble: EnsembleState::default(),
            evaluation,
            models,
        }
    }

    /// Ensemble state every fresh pipeline starts from before calibration.
    pub fn with_initial_ensemble(mut self, state: EnsembleState) -> Self {
        self.initial_ensemble = state;
        self
    }

    /// Fits, evaluates and calibrates a fresh pipeline per symbol.
    pub fn evaluate_parallel(&self, batch: Vec<SymbolData>) -> Vec<BatchResult<SymbolEvaluation>> {
        batch
            .into_par_iter()
            .map(|data| {
                let result = self.evaluate_single(&data);
                BatchResult {
                    symbol: data.symbol,
                    result: result.map_err(|e| e.to_string()),
                }
            })
            .collect()
    }

    /// Forecasts the next step for already fitted pipelines.
    pub fn forecast_parallel(
        &self,
        batch: Vec<(ForecastPipeline, FeatureMatrix)>,
    ) -> Vec<BatchResult<PredictionResult>> {
        batch
            .into_par_iter()
            .map(|(pipeline, features)| {
                let columns = pipeline.feature_columns();
                let sequence_model = self.models.sequence_model(pipeline.symbol(), columns);
                let window_model = self.models.window_model(pipeline.symbol(), columns);

                let result =
                    pipeline.forecast(&features, sequence_model.as_ref(), window_model.as_ref());
                BatchResult {
                    symbol: pipeline.symbol().to_string(),
                    result: result.map_err(|e| e.to_string()),
                }
            })
            .collect()
    }

    fn evaluate_single(&self, data: &SymbolData) -> ForecastResult<SymbolEvaluation> {
        let mut pipeline = ForecastPipeline::new(data.symbol.clone(), self.settings);
        pipeline.set_ensemble(self.initial_ensemble);

        // Same projection fit_transform applies
        let columns = select_canonical_columns(data.features.columns());
        let sequence_model = self.models.sequence_model(&data.symbol, &columns);
        let window_model = self.models.window_model(&data.symbol, &columns);

        let report = self.evaluation.evaluate(
            &mut pipeline,
            &data.features,
            sequence_model.as_ref(),
            window_model.as_ref(),
        )?;
        Ok(SymbolEvaluation { pipeline, report })
    }
}
