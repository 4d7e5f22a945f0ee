// CSV inputs (feature matrices, prediction history)
pub mod csv_loader;

// Per-symbol JSON artifacts and the models index
pub mod model_store;

// Metrics and run summaries
pub mod observability;
