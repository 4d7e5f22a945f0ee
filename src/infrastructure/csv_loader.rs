use crate::domain::ml::FeatureMatrix;
use crate::domain::ml::feature_registry::select_canonical_columns;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

/// Historical prediction triples, one per day, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionHistory {
    pub sequence: Vec<f64>,
    pub tree: Vec<f64>,
    pub actual: Vec<f64>,
}

impl PredictionHistory {
    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct PredictionRecord {
    #[serde(alias = "sequence")]
    lstm: f64,
    #[serde(alias = "tree")]
    xgboost: f64,
    actual: f64,
}

/// Loads a feature CSV with a header row.
///
/// Only `columns` are read (the canonical features present in the header
/// when `None`); other columns such as `Date` are ignored. Rows with an empty
/// or non-numeric cell in a selected column are dropped.
pub fn load_feature_matrix(path: &Path, columns: Option<&[String]>) -> Result<FeatureMatrix> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let matrix = read_feature_matrix(BufReader::new(file), columns)
        .with_context(|| format!("Failed to load features from {:?}", path))?;
    info!(
        "Loaded {} rows x {} features from {:?}",
        matrix.len(),
        matrix.n_columns(),
        path
    );
    Ok(matrix)
}

pub fn read_feature_matrix<R: Read>(reader: R, columns: Option<&[String]>) -> Result<FeatureMatrix> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let selected = match columns {
        Some(names) => names.to_vec(),
        None => select_canonical_columns(&headers),
    };
    let positions = selected
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h == name)
                .with_context(|| format!("Column {} not found in CSV header", name))
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV record {}", line + 1))?;
        let row: Vec<Option<f64>> = positions
            .iter()
            .map(|&p| record.get(p).and_then(|cell| cell.trim().parse::<f64>().ok()))
            .collect();
        rows.push(row);
    }

    Ok(FeatureMatrix::from_rows(selected, rows)?)
}

/// Loads a prediction CSV with `lstm,xgboost,actual` columns (prices).
pub fn load_prediction_history(path: &Path) -> Result<PredictionHistory> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let history = read_prediction_history(BufReader::new(file))
        .with_context(|| format!("Failed to load predictions from {:?}", path))?;
    info!("Loaded {} prediction rows from {:?}", history.len(), path);
    Ok(history)
}

pub fn read_prediction_history<R: Read>(reader: R) -> Result<PredictionHistory> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut history = PredictionHistory::default();
    for result in rdr.deserialize() {
        let record: PredictionRecord = result.context("Malformed prediction record")?;
        history.sequence.push(record.lstm);
        history.tree.push(record.xgboost);
        history.actual.push(record.actual);
    }

    if history.is_empty() {
        bail!("Prediction file has no rows");
    }
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_canonical_columns_and_drops_gaps() {
        let data = "\
Date,Open,High,Low,Close,Volume,Note
2024-01-02,1.0,2.0,0.5,1.5,100,x
2024-01-03,1.1,,0.6,1.6,110,y
2024-01-04,1.2,2.2,0.7,1.7,120,
";
        let matrix = read_feature_matrix(data.as_bytes(), None).unwrap();
        assert_eq!(matrix.columns(), &["Open", "High", "Low", "Close", "Volume"]);
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.close_prices(), vec![1.5, 1.7]);
    }

    #[test]
    fn test_explicit_columns_must_exist() {
        let data = "Open,Close\n1.0,1.5\n";
        let columns = vec!["Close".to_string(), "RSI".to_string()];
        assert!(read_feature_matrix(data.as_bytes(), Some(&columns)).is_err());

        let columns = vec!["Close".to_string()];
        let matrix = read_feature_matrix(data.as_bytes(), Some(&columns)).unwrap();
        assert_eq!(matrix.n_columns(), 1);
    }

    #[test]
    fn test_reads_prediction_history() {
        let data = "lstm, xgboost, actual\n152.0, 151.5, 151.0\n150.0, 149.5, 149.0\n";
        let history = read_prediction_history(data.as_bytes()).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.sequence, vec![152.0, 150.0]);
        assert_eq!(history.tree, vec![151.5, 149.5]);
        assert_eq!(history.actual, vec![151.0, 149.0]);
    }

    #[test]
    fn test_empty_prediction_history_is_rejected() {
        assert!(read_prediction_history("lstm,xgboost,actual\n".as_bytes()).is_err());
    }
}
