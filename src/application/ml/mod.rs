pub mod naive;
pub mod predictor;

pub use naive::{BaselineFactory, LastCloseSequencePredictor, LastCloseWindowPredictor};
pub use predictor::{PredictorFactory, SequencePredictor, WindowPredictor};
