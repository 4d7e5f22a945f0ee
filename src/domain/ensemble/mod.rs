// Two-model price ensemble: combination, confidence and calibration
pub mod calibration;
pub mod combiner;
pub mod confidence;
pub mod prediction;
pub mod state;

pub use calibration::{Calibration, CalibrationOutcome, Calibrator};
pub use combiner::{Combination, EnsembleCombiner};
pub use confidence::ConfidenceScorer;
pub use prediction::{Direction, PredictionResult, round2};
pub use state::EnsembleState;
