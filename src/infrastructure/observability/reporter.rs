//! Run summaries for Pricecast
//!
//! A CLI run ends by emitting one structured JSON line on stdout, so batch
//! jobs can be scraped by log shippers without a metrics endpoint.

use crate::domain::ensemble::{EnsembleState, PredictionResult};
use crate::domain::performance::BacktestMetrics;
use crate::infrastructure::observability::metrics::ForecastMetrics;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Run snapshot for JSON output
#[derive(Debug, Serialize)]
pub struct RunSnapshot {
    pub timestamp: String,
    pub elapsed_ms: u128,
    pub version: String,
    pub command: String,
    pub symbols: Vec<SymbolSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolSnapshot {
    pub symbol: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backtest: Option<BacktestMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ensemble: Option<EnsembleState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction: Option<PredictionResult>,
}

impl SymbolSnapshot {
    pub fn ok(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ok: true,
            error: None,
            backtest: None,
            ensemble: None,
            prediction: None,
        }
    }

    pub fn failed(symbol: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ok: false,
            ..Self::ok(symbol)
        }
    }

    pub fn with_backtest(mut self, metrics: BacktestMetrics) -> Self {
        self.backtest = Some(metrics);
        self
    }

    pub fn with_ensemble(mut self, state: EnsembleState) -> Self {
        self.ensemble = Some(state);
        self
    }

    pub fn with_prediction(mut self, prediction: PredictionResult) -> Self {
        self.prediction = Some(prediction);
        self
    }
}

/// Collects per-symbol outcomes of one CLI command and emits the summary.
pub struct RunReporter {
    command: String,
    metrics: ForecastMetrics,
    start_time: Instant,
    symbols: Vec<SymbolSnapshot>,
}

impl RunReporter {
    pub fn new(command: impl Into<String>, metrics: ForecastMetrics) -> Self {
        Self {
            command: command.into(),
            metrics,
            start_time: Instant::now(),
            symbols: Vec::new(),
        }
    }

    pub fn metrics(&self) -> &ForecastMetrics {
        &self.metrics
    }

    /// Adds a symbol outcome and mirrors it into the Prometheus registry.
    pub fn push(&mut self, snapshot: SymbolSnapshot) {
        if let Some(metrics) = &snapshot.backtest {
            self.metrics.record_backtest(&snapshot.symbol, metrics);
        }
        if let Some(state) = &snapshot.ensemble {
            self.metrics.record_state(&snapshot.symbol, state);
        }
        if let Some(prediction) = &snapshot.prediction {
            self.metrics.record_prediction(&snapshot.symbol, prediction);
        }
        if !snapshot.ok {
            self.metrics.inc_batch_failures(&self.command);
        }
        self.symbols.push(snapshot);
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            elapsed_ms: self.start_time.elapsed().as_millis(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            command: self.command.clone(),
            symbols: self.symbols.clone(),
        }
    }

    /// Prints the run summary as a single prefixed JSON line.
    pub fn emit(&self) {
        let snapshot = self.snapshot();
        self.metrics
            .observe_stage(&self.command, self.start_time.elapsed().as_secs_f64());

        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                println!("RUN_JSON:{}", json);
                let failed = snapshot.symbols.iter().filter(|s| !s.ok).count();
                info!(
                    "{}: {} symbols, {} failed, {} ms",
                    snapshot.command,
                    snapshot.symbols.len(),
                    failed,
                    snapshot.elapsed_ms
                );
            }
            Err(e) => warn!("Failed to serialize run summary: {}", e),
        }
    }
}
