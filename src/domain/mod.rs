// Domain-specific error types
pub mod errors;

// Feature matrices, scaling and windowing
pub mod ml;

// Ensemble combination and calibration
pub mod ensemble;

// Backtesting and statistics
pub mod performance;
