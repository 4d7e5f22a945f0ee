// Walk-forward evaluation of the ensemble
pub mod backtest;
pub mod stats;

pub use backtest::{BacktestMetrics, BacktestReport, BacktestStep, Backtester};
pub use stats::Stats;
