// Feature preparation for the two external predictors
pub mod feature_matrix;
pub mod feature_registry;
pub mod scaler;
pub mod windowing;

pub use feature_matrix::FeatureMatrix;
pub use scaler::{FittedScaler, MinMaxScaler, ScalerParams};
pub use windowing::{FlattenWindower, FlattenedSet, SequenceSet, SequenceWindower};
