//! Machine learning for incident count forecasting
//!
//! Aggregated groups are label-encoded, split into train and test
//! partitions, and fitted with a gradient-boosted tree ensemble under a
//! Poisson objective.

pub mod cart;
pub mod dataset;
pub mod encoder;
pub mod features;
pub mod metrics;
pub mod model;
pub mod training;

pub use dataset::{EncodedDataset, EncodedRow, TrainTestSplit};
pub use encoder::LabelEncoder;
pub use features::ForecastFeatures;
pub use metrics::Evaluation;
pub use model::{BoosterParams, GradientBoostedRegressor, Objective, TrainingError};
pub use training::{train_forecast, ScoredRow, TrainingResult};
