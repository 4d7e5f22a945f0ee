use pricecast::application::batch::{BatchForecaster, SymbolData};
use pricecast::application::evaluation::EvaluationService;
use pricecast::application::ml::{BaselineFactory, PredictorFactory};
use pricecast::application::pipeline::PipelineSettings;
use pricecast::domain::ensemble::CalibrationOutcome;
use pricecast::infrastructure::csv_loader::load_feature_matrix;
use pricecast::infrastructure::model_store::ModelStore;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "pricecast_flow_{}_{}",
        name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Daily OHLCV rows with a Date column and a wobbling uptrend.
fn write_feature_csv(dir: &Path, symbol: &str, rows: usize) -> PathBuf {
    let mut csv = String::from("Date,Open,High,Low,Close,Volume\n");
    for i in 0..rows {
        let close = 100.0 + i as f64 + if i % 3 == 0 { 1.5 } else { 0.0 };
        writeln!(
            csv,
            "2024-01-{:02},{:.2},{:.2},{:.2},{:.2},{}",
            i % 28 + 1,
            close - 0.5,
            close + 1.0,
            close - 1.0,
            close,
            1000 + i * 10
        )
        .unwrap();
    }
    let path = dir.join(format!("{}.csv", symbol));
    fs::write(&path, csv).unwrap();
    path
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        sequence_length: 10,
        prediction_horizon: 1,
        lookback: 5,
        volatility_window: 20,
    }
}

#[test]
fn test_prepare_persist_and_forecast() {
    let data_dir = temp_dir("data");
    let store = ModelStore::new(temp_dir("models"));

    let aapl = load_feature_matrix(&write_feature_csv(&data_dir, "AAPL", 80), None).unwrap();
    let tiny = load_feature_matrix(&write_feature_csv(&data_dir, "TINY", 8), None).unwrap();
    assert_eq!(aapl.columns(), &["Open", "High", "Low", "Close", "Volume"]);

    let forecaster = BatchForecaster::new(
        settings(),
        EvaluationService::new(0.2),
        Arc::new(BaselineFactory),
    );
    let results = forecaster.evaluate_parallel(vec![
        SymbolData {
            symbol: "AAPL".to_string(),
            features: aapl.clone(),
        },
        SymbolData {
            symbol: "TINY".to_string(),
            features: tiny,
        },
    ]);
    assert_eq!(results.len(), 2);

    let tiny_result = results.iter().find(|r| r.symbol == "TINY").unwrap();
    assert!(tiny_result.result.is_err());

    let evaluation = results
        .into_iter()
        .find(|r| r.symbol == "AAPL")
        .unwrap()
        .result
        .unwrap();
    let report = &evaluation.report;

    // 80 - 10 - 1 + 1 = 70 sequences, 14 held out, the last without a flattened window
    assert_eq!(report.train_samples, 56);
    assert_eq!(report.test_samples, 13);
    assert_eq!(report.backtest.len(), report.test_samples);
    assert_eq!(report.calibration.outcome, CalibrationOutcome::Reweighted);

    // Both baselines predict yesterday's close, so they share the weight
    let state = *evaluation.pipeline.ensemble();
    assert!((state.sequence_weight - 0.5).abs() < 1e-9);
    assert!((state.tree_weight - 0.5).abs() < 1e-9);
    assert!(state.sequence_bias > 0.0);

    store
        .save_pipeline(&evaluation.pipeline, report.backtest.metrics)
        .unwrap();
    let index = store.rebuild_index().unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].symbol, "AAPL");
    assert_eq!(store.load_index().unwrap()[0].symbol, "AAPL");

    let restored = store.load_pipeline("AAPL", 20).unwrap();
    assert_eq!(restored.feature_columns(), evaluation.pipeline.feature_columns());

    let columns = restored.feature_columns().to_vec();
    let sequence_model = BaselineFactory.sequence_model("AAPL", &columns);
    let window_model = BaselineFactory.window_model("AAPL", &columns);

    let before = evaluation
        .pipeline
        .forecast(&aapl, sequence_model.as_ref(), window_model.as_ref())
        .unwrap();
    let after = restored
        .forecast(&aapl, sequence_model.as_ref(), window_model.as_ref())
        .unwrap();

    assert_eq!(before.current_price, aapl.last_close().unwrap());
    assert!((before.predicted_price - after.predicted_price).abs() < 0.011);
    assert_eq!(before.direction, after.direction);
    assert!((0.0..=100.0).contains(&after.confidence));
}

#[test]
fn test_forecast_parallel_after_reload() {
    let data_dir = temp_dir("parallel_data");
    let store = ModelStore::new(temp_dir("parallel_models"));

    let forecaster = BatchForecaster::new(
        settings(),
        EvaluationService::new(0.25),
        Arc::new(BaselineFactory),
    );

    let mut batch = Vec::new();
    for symbol in ["MSFT", "NVDA"] {
        let features = load_feature_matrix(&write_feature_csv(&data_dir, symbol, 60), None).unwrap();
        batch.push(SymbolData {
            symbol: symbol.to_string(),
            features,
        });
    }
    for outcome in forecaster.evaluate_parallel(batch) {
        let evaluation = outcome.result.unwrap();
        store
            .save_pipeline(&evaluation.pipeline, evaluation.report.backtest.metrics)
            .unwrap();
    }
    assert_eq!(store.list_symbols().unwrap(), vec!["MSFT", "NVDA"]);

    let mut reloaded = Vec::new();
    for symbol in store.list_symbols().unwrap() {
        let pipeline = store.load_pipeline(&symbol, 20).unwrap();
        let features = load_feature_matrix(
            &data_dir.join(format!("{}.csv", symbol)),
            Some(pipeline.feature_columns()),
        )
        .unwrap();
        reloaded.push((pipeline, features));
    }

    let predictions = forecaster.forecast_parallel(reloaded);
    assert_eq!(predictions.len(), 2);
    for outcome in predictions {
        let prediction = outcome.result.unwrap();
        assert!(prediction.predicted_price > 0.0);
    }
}
