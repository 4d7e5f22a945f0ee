/// Canonical ordered list of feature columns.
/// This order MUST match the order the upstream indicator pipeline emits and the
/// order the persisted scaler parameters were fitted on.
/// Any change here is a breaking change for trained models.
pub const FEATURE_COLUMNS: &[&str] = &[
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "RSI",
    "MACD",
    "MACD_Signal",
    "MACD_Hist",
    "BB_Upper",
    "BB_Middle",
    "BB_Lower",
    "BB_Width",
    "SMA_20",
    "SMA_50",
    "EMA_12",
    "EMA_26",
    "Daily_Return",
    "Volatility",
    "Volume_Ratio",
    "Momentum_5",
    "Momentum_10",
    "Momentum_20",
    "Price_SMA20_Ratio",
    "Price_SMA50_Ratio",
];

/// Name of the price column every target is taken from.
pub const CLOSE_COLUMN: &str = "Close";

/// Position of `Close` under the canonical ordering.
pub const CLOSE_INDEX: usize = 3;

/// Keeps the canonical columns that are present in `available`, in canonical order.
pub fn select_canonical_columns(available: &[String]) -> Vec<String> {
    FEATURE_COLUMNS
        .iter()
        .filter(|name| available.iter().any(|a| a == *name))
        .map(|name| name.to_string())
        .collect()
}

/// Names of the flattened lookback features: `<feature>_t-<k>`, oldest row first.
///
/// Depends only on `(feature_names, lookback)`, never on row count.
pub fn flattened_feature_names(feature_names: &[String], lookback: usize) -> Vec<String> {
    let mut names = Vec::with_capacity(lookback * feature_names.len());
    for day in 0..lookback {
        for name in feature_names {
            names.push(format!("{}_t-{}", name, lookback - day));
        }
    }
    names
}
