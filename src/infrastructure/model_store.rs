use crate::application::pipeline::{ForecastPipeline, PipelineSettings};
use crate::domain::ensemble::EnsembleState;
use crate::domain::ml::{FittedScaler, ScalerParams};
use crate::domain::performance::BacktestMetrics;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const ENSEMBLE_FILE: &str = "ensemble_config.json";
const SCALER_FILE: &str = "scaler_params.json";
const PREPROCESSING_FILE: &str = "preprocessing_config.json";
const INDEX_FILE: &str = "models_index.json";

/// Windowing and provenance of a trained symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    pub feature_columns: Vec<String>,
    pub sequence_length: usize,
    #[serde(default = "default_horizon")]
    pub prediction_horizon: usize,
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    pub symbol: String,
    pub trained_at: DateTime<Utc>,
    pub metrics: BacktestMetrics,
}

fn default_horizon() -> usize {
    PipelineSettings::default().prediction_horizon
}

fn default_lookback() -> usize {
    PipelineSettings::default().lookback
}

impl PreprocessingConfig {
    /// Pipeline settings recorded at training time; the volatility window is
    /// not persisted and comes from the caller.
    pub fn settings(&self, volatility_window: usize) -> PipelineSettings {
        PipelineSettings {
            sequence_length: self.sequence_length,
            prediction_horizon: self.prediction_horizon,
            lookback: self.lookback,
            volatility_window,
        }
    }
}

/// One line of `models_index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelIndexEntry {
    pub symbol: String,
    pub trained_at: DateTime<Utc>,
    pub metrics: BacktestMetrics,
}

/// Per-symbol JSON artifacts under a model directory:
/// `<root>/<symbol lowercase>/{ensemble_config,scaler_params,preprocessing_config}.json`
/// plus `<root>/models_index.json`.
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.root.join(symbol.to_lowercase())
    }

    pub fn save_ensemble(&self, symbol: &str, state: &EnsembleState) -> Result<()> {
        self.write_symbol_file(symbol, ENSEMBLE_FILE, state)
    }

    pub fn load_ensemble(&self, symbol: &str) -> Result<Option<EnsembleState>> {
        read_json(&self.symbol_dir(symbol).join(ENSEMBLE_FILE))
    }

    pub fn save_scaler(&self, symbol: &str, scaler: &FittedScaler) -> Result<()> {
        self.write_symbol_file(symbol, SCALER_FILE, &scaler.params())
    }

    pub fn load_scaler(&self, symbol: &str) -> Result<Option<FittedScaler>> {
        let path = self.symbol_dir(symbol).join(SCALER_FILE);
        match read_json::<ScalerParams>(&path)? {
            Some(params) => {
                let scaler = FittedScaler::from_params(&params)
                    .with_context(|| format!("Invalid scaler parameters in {:?}", path))?;
                Ok(Some(scaler))
            }
            None => Ok(None),
        }
    }

    pub fn save_preprocessing(&self, config: &PreprocessingConfig) -> Result<()> {
        self.write_symbol_file(&config.symbol, PREPROCESSING_FILE, config)
    }

    pub fn load_preprocessing(&self, symbol: &str) -> Result<Option<PreprocessingConfig>> {
        read_json(&self.symbol_dir(symbol).join(PREPROCESSING_FILE))
    }

    /// Persists everything needed to rebuild `pipeline` later.
    pub fn save_pipeline(
        &self,
        pipeline: &ForecastPipeline,
        metrics: BacktestMetrics,
    ) -> Result<PreprocessingConfig> {
        let scaler = pipeline
            .scaler()
            .with_context(|| format!("Pipeline for {} has not been fitted", pipeline.symbol()))?;
        let settings = pipeline.settings();

        let config = PreprocessingConfig {
            feature_columns: pipeline.feature_columns().to_vec(),
            sequence_length: settings.sequence_length,
            prediction_horizon: settings.prediction_horizon,
            lookback: settings.lookback,
            symbol: pipeline.symbol().to_string(),
            trained_at: Utc::now(),
            metrics,
        };

        self.save_ensemble(pipeline.symbol(), pipeline.ensemble())?;
        self.save_scaler(pipeline.symbol(), scaler)?;
        self.save_preprocessing(&config)?;

        info!(
            "Saved {} artifacts to {:?}",
            pipeline.symbol(),
            self.symbol_dir(pipeline.symbol())
        );
        Ok(config)
    }

    /// Rebuilds a fitted pipeline. A missing ensemble config falls back to
    /// the default weights.
    pub fn load_pipeline(&self, symbol: &str, volatility_window: usize) -> Result<ForecastPipeline> {
        let config = self
            .load_preprocessing(symbol)?
            .with_context(|| format!("No preprocessing config for {}", symbol))?;
        let scaler = self
            .load_scaler(symbol)?
            .with_context(|| format!("No scaler parameters for {}", symbol))?;
        let ensemble = match self.load_ensemble(symbol)? {
            Some(state) => state,
            None => {
                warn!("No ensemble config for {}, using default weights", symbol);
                EnsembleState::default()
            }
        };

        let pipeline = ForecastPipeline::restore(
            config.symbol.clone(),
            config.settings(volatility_window),
            scaler,
            config.feature_columns,
            ensemble,
        )?;
        Ok(pipeline)
    }

    /// Symbols with a preprocessing config, sorted by directory name.
    pub fn list_symbols(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("Failed to list {:?}", self.root))?
        {
            let entry = entry.context("Failed to read model directory entry")?;
            let path = entry.path();
            if path.is_dir() && path.join(PREPROCESSING_FILE).exists() {
                symbols.push(entry.file_name().to_string_lossy().to_uppercase());
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    /// Regenerates `models_index.json` from every symbol directory.
    ///
    /// Unreadable configs are skipped with a warning.
    pub fn rebuild_index(&self) -> Result<Vec<ModelIndexEntry>> {
        let mut index = Vec::new();
        for symbol in self.list_symbols()? {
            match self.load_preprocessing(&symbol) {
                Ok(Some(config)) => index.push(ModelIndexEntry {
                    symbol: config.symbol,
                    trained_at: config.trained_at,
                    metrics: config.metrics,
                }),
                Ok(None) => {}
                Err(e) => warn!("Skipping {} in models index: {:#}", symbol, e),
            }
        }

        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create {:?}", self.root))?;
        write_json_atomic(&self.root.join(INDEX_FILE), &index)?;
        info!("Models index rebuilt with {} models", index.len());
        Ok(index)
    }

    pub fn load_index(&self) -> Result<Vec<ModelIndexEntry>> {
        Ok(read_json(&self.root.join(INDEX_FILE))?.unwrap_or_default())
    }

    fn write_symbol_file<T: Serialize>(&self, symbol: &str, file: &str, value: &T) -> Result<()> {
        let dir = self.symbol_dir(symbol);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
        write_json_atomic(&dir.join(file), value)
    }
}

/// Atomic write: write to temp file then rename
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)
        .with_context(|| format!("Failed to write temp file {:?}", temp_path))?;
    fs::rename(&temp_path, path).with_context(|| format!("Failed to rename into {:?}", path))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let value =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(Some(value))
}
