//! Push-based observability for Pricecast
//!
//! Metrics are never served. They leave the process as:
//!
//! 1. **Structured JSON Logs**: one run summary per CLI command on stdout
//! 2. **Prometheus text format**: rendered on demand (`--metrics`)

pub mod metrics;
pub mod reporter;

pub use metrics::ForecastMetrics;
pub use reporter::{RunReporter, RunSnapshot, SymbolSnapshot};
