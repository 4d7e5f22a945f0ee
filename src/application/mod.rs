// Model ports and baseline predictors
pub mod ml;

// Per-symbol forecasting pipeline
pub mod pipeline;

// Held-out evaluation and calibration
pub mod evaluation;

// Multi-symbol parallel runs
pub mod batch;
