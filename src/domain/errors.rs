use thiserror::Error;

/// Errors raised by the scaling, windowing and ensemble core.
///
/// Every variant is local and recoverable: the core performs no I/O, so the
/// caller decides whether to retry with more data or abort.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Scaler has not been fitted")]
    NotFitted,

    #[error("Cannot fit scaler on an empty feature matrix")]
    EmptyMatrix,

    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeError {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Required column {column} is missing from the feature matrix")]
    MissingColumn { column: String },

    #[error("Current price is zero, cannot compute {quantity}")]
    DivideByZero { quantity: &'static str },

    #[error("Insufficient data: need {required} rows, {available} available")]
    InsufficientData { required: usize, available: usize },

    #[error("Model {model} failed: {reason}")]
    Model { model: String, reason: String },
}

impl ForecastError {
    pub fn shape(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        ForecastError::ShapeError {
            context: context.into(),
            expected,
            actual,
        }
    }
}

pub type ForecastResult<T> = Result<T, ForecastError>;
