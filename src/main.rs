use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pricecast::application::batch::{BatchForecaster, SymbolData};
use pricecast::application::evaluation::EvaluationService;
use pricecast::application::ml::BaselineFactory;
use pricecast::config::Config;
use pricecast::domain::ensemble::{Calibrator, EnsembleCombiner, EnsembleState};
use pricecast::domain::performance::Backtester;
use pricecast::infrastructure::csv_loader::{load_feature_matrix, load_prediction_history};
use pricecast::infrastructure::model_store::ModelStore;
use pricecast::infrastructure::observability::{ForecastMetrics, RunReporter, SymbolSnapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit scalers, evaluate on the held-out tail, calibrate and save artifacts
    Prepare {
        /// Symbol(s) to prepare (comma separated, defaults to SYMBOLS)
        #[arg(short, long)]
        symbols: Option<String>,
    },
    /// Forecast the next close
    Predict {
        /// Symbol(s) to forecast (comma separated, defaults to SYMBOLS)
        #[arg(short, long)]
        symbols: Option<String>,

        /// Sequence model price; with --xgboost and --current skips the models
        #[arg(long)]
        lstm: Option<f64>,

        /// Tree model price
        #[arg(long)]
        xgboost: Option<f64>,

        /// Reference price for the direction call
        #[arg(long)]
        current: Option<f64>,

        /// Recent volatility used for confidence
        #[arg(long)]
        volatility: Option<f64>,
    },
    /// Replay a prediction history (lstm,xgboost,actual CSV) through the ensemble
    Backtest {
        symbol: String,

        /// Prediction CSV (defaults to DATA_DIR/<SYMBOL>_predictions.csv)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Sequence model weight; the tree model gets the complement
        #[arg(long)]
        lstm_weight: Option<f64>,

        /// Price before the first row (defaults to the first actual)
        #[arg(long)]
        initial_price: Option<f64>,
    },
    /// Refit ensemble weights and biases from a prediction history
    Calibrate {
        symbol: String,

        /// Prediction CSV (defaults to DATA_DIR/<SYMBOL>_predictions.csv)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Rebuild models_index.json from the saved artifacts
    Index,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr, stdout carries results
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let store = ModelStore::new(config.model_dir.clone());
    let metrics = ForecastMetrics::new()?;

    let reporter = match cli.command {
        Commands::Prepare { symbols } => {
            let symbols = resolve_symbols(symbols.as_deref(), &config);
            prepare(&config, &store, &symbols, metrics)?
        }
        Commands::Predict {
            symbols,
            lstm,
            xgboost,
            current,
            volatility,
        } => {
            let symbols = resolve_symbols(symbols.as_deref(), &config);
            match (lstm, xgboost, current) {
                (Some(lstm), Some(xgboost), Some(current)) => predict_manual(
                    &config,
                    &store,
                    &symbols,
                    [lstm, xgboost, current],
                    volatility,
                    metrics,
                )?,
                (None, None, None) => predict(&config, &store, &symbols, metrics)?,
                _ => anyhow::bail!("--lstm, --xgboost and --current must be given together"),
            }
        }
        Commands::Backtest {
            symbol,
            file,
            lstm_weight,
            initial_price,
        } => {
            let symbol = symbol.to_uppercase();
            let path = file.unwrap_or_else(|| prediction_file(&config, &symbol));
            let state = match lstm_weight {
                Some(w) => EnsembleState::with_sequence_weight(w),
                None => config.initial_ensemble(),
            };
            backtest(&symbol, &path, state, initial_price, metrics)?
        }
        Commands::Calibrate { symbol, file } => {
            let symbol = symbol.to_uppercase();
            let path = file.unwrap_or_else(|| prediction_file(&config, &symbol));
            calibrate(&config, &store, &symbol, &path, metrics)?
        }
        Commands::Index => {
            let entries = store.rebuild_index()?;
            let mut reporter = RunReporter::new("index", metrics);
            for entry in entries {
                reporter.push(SymbolSnapshot::ok(entry.symbol).with_backtest(entry.metrics));
            }
            reporter
        }
    };

    if config.run_summary_enabled {
        reporter.emit();
    }
    if config.metrics_enabled {
        print!("{}", reporter.metrics().render());
    }
    Ok(())
}

fn resolve_symbols(arg: Option<&str>, config: &Config) -> Vec<String> {
    match arg {
        Some(list) => list
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect(),
        None => config.symbols.clone(),
    }
}

fn prediction_file(config: &Config, symbol: &str) -> PathBuf {
    config.data_dir.join(format!("{}_predictions.csv", symbol))
}

fn prepare(
    config: &Config,
    store: &ModelStore,
    symbols: &[String],
    metrics: ForecastMetrics,
) -> Result<RunReporter> {
    let mut reporter = RunReporter::new("prepare", metrics);

    let mut batch = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let path = config.feature_file(symbol);
        match load_feature_matrix(&path, None) {
            Ok(features) => batch.push(SymbolData {
                symbol: symbol.clone(),
                features,
            }),
            Err(e) => {
                warn!("Skipping {}: {:#}", symbol, e);
                reporter.push(SymbolSnapshot::failed(symbol, format!("{:#}", e)));
            }
        }
    }

    let forecaster = BatchForecaster::new(
        config.pipeline_settings(),
        EvaluationService::new(config.test_size),
        Arc::new(BaselineFactory),
    )
    .with_initial_ensemble(config.initial_ensemble());

    for outcome in forecaster.evaluate_parallel(batch) {
        let evaluation = match outcome.result {
            Ok(evaluation) => evaluation,
            Err(e) => {
                warn!("Evaluation failed for {}: {}", outcome.symbol, e);
                reporter.push(SymbolSnapshot::failed(outcome.symbol, e));
                continue;
            }
        };

        let report = &evaluation.report;
        info!(
            "{}: {} train / {} test, accuracy {:.2}%, MAE {:.4}, RMSE {:.4}, MAPE {:.2}%",
            report.symbol,
            report.train_samples,
            report.test_samples,
            report.backtest.metrics.direction_accuracy,
            report.backtest.metrics.mae,
            report.backtest.metrics.rmse,
            report.backtest.metrics.mape
        );
        reporter
            .metrics()
            .record_calibration(&report.symbol, &report.calibration);

        match store.save_pipeline(&evaluation.pipeline, report.backtest.metrics) {
            Ok(_) => reporter.push(
                SymbolSnapshot::ok(&report.symbol)
                    .with_backtest(report.backtest.metrics)
                    .with_ensemble(*evaluation.pipeline.ensemble()),
            ),
            Err(e) => {
                warn!("Failed to save {}: {:#}", report.symbol, e);
                reporter.push(SymbolSnapshot::failed(&report.symbol, format!("{:#}", e)));
            }
        }
    }

    let index = store.rebuild_index()?;
    info!("Model index holds {} symbols", index.len());
    Ok(reporter)
}

fn predict(
    config: &Config,
    store: &ModelStore,
    symbols: &[String],
    metrics: ForecastMetrics,
) -> Result<RunReporter> {
    let mut reporter = RunReporter::new("predict", metrics);

    let mut batch = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let loaded = store
            .load_pipeline(symbol, config.volatility_window)
            .and_then(|pipeline| {
                let features = load_feature_matrix(
                    &config.feature_file(symbol),
                    Some(pipeline.feature_columns()),
                )?;
                Ok((pipeline, features))
            });
        match loaded {
            Ok(item) => batch.push(item),
            Err(e) => {
                warn!("Skipping {}: {:#}", symbol, e);
                reporter.push(SymbolSnapshot::failed(symbol, format!("{:#}", e)));
            }
        }
    }

    let forecaster = BatchForecaster::new(
        config.pipeline_settings(),
        EvaluationService::new(config.test_size),
        Arc::new(BaselineFactory),
    );

    for outcome in forecaster.forecast_parallel(batch) {
        match outcome.result {
            Ok(prediction) => {
                info!(
                    "{}: {} to {:.2} ({:+.2}%), confidence {:.1}",
                    outcome.symbol,
                    prediction.direction,
                    prediction.predicted_price,
                    prediction.price_change_percent,
                    prediction.confidence
                );
                reporter.push(SymbolSnapshot::ok(outcome.symbol).with_prediction(prediction));
            }
            Err(e) => {
                warn!("Forecast failed for {}: {}", outcome.symbol, e);
                reporter.push(SymbolSnapshot::failed(outcome.symbol, e));
            }
        }
    }
    Ok(reporter)
}

/// Combines externally produced model prices with each symbol's saved ensemble.
fn predict_manual(
    config: &Config,
    store: &ModelStore,
    symbols: &[String],
    [lstm, xgboost, current]: [f64; 3],
    volatility: Option<f64>,
    metrics: ForecastMetrics,
) -> Result<RunReporter> {
    let mut reporter = RunReporter::new("predict", metrics);

    for symbol in symbols {
        let state = match store.load_ensemble(symbol)? {
            Some(state) => state,
            None => {
                warn!("No ensemble config for {}, using configured weights", symbol);
                config.initial_ensemble()
            }
        };

        match EnsembleCombiner::new(state).predict(lstm, xgboost, current, volatility) {
            Ok(prediction) => {
                info!(
                    "{}: {} to {:.2}, confidence {:.1}",
                    symbol, prediction.direction, prediction.predicted_price, prediction.confidence
                );
                reporter.push(
                    SymbolSnapshot::ok(symbol)
                        .with_ensemble(state)
                        .with_prediction(prediction),
                );
            }
            Err(e) => reporter.push(SymbolSnapshot::failed(symbol, e.to_string())),
        }
    }
    Ok(reporter)
}

fn backtest(
    symbol: &str,
    path: &Path,
    state: EnsembleState,
    initial_price: Option<f64>,
    metrics: ForecastMetrics,
) -> Result<RunReporter> {
    let history = load_prediction_history(path)?;
    let initial = initial_price.unwrap_or(history.actual[0]);

    let report = Backtester::new(state)
        .run(&history.sequence, &history.tree, &history.actual, initial)
        .with_context(|| format!("Backtest failed for {}", symbol))?;

    info!(
        "{}: {} days, accuracy {:.2}%, MAE {:.4}, RMSE {:.4}, MAPE {:.2}%",
        symbol,
        report.len(),
        report.metrics.direction_accuracy,
        report.metrics.mae,
        report.metrics.rmse,
        report.metrics.mape
    );

    let mut reporter = RunReporter::new("backtest", metrics);
    reporter.push(
        SymbolSnapshot::ok(symbol)
            .with_backtest(report.metrics)
            .with_ensemble(state),
    );
    Ok(reporter)
}

fn calibrate(
    config: &Config,
    store: &ModelStore,
    symbol: &str,
    path: &Path,
    metrics: ForecastMetrics,
) -> Result<RunReporter> {
    let history = load_prediction_history(path)?;
    let current = store
        .load_ensemble(symbol)?
        .unwrap_or_else(|| config.initial_ensemble());

    let calibration =
        Calibrator::calibrate(&current, &history.sequence, &history.tree, &history.actual)
            .with_context(|| format!("Calibration failed for {}", symbol))?;
    store.save_ensemble(symbol, &calibration.state)?;

    let mut reporter = RunReporter::new("calibrate", metrics);
    reporter
        .metrics()
        .record_calibration(symbol, &calibration);
    reporter.push(SymbolSnapshot::ok(symbol).with_ensemble(calibration.state));
    Ok(reporter)
}
