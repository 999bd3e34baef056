//! Incident Forecast Library
//!
//! This module exposes the stages of the incident forecasting job for
//! testing and reuse: loading, feature derivation, aggregation, model
//! training and report export.

pub mod aggregate;
pub mod config;
pub mod db;
pub mod enrich;
pub mod ml;
pub mod pipeline;
pub mod report;
pub mod traits;

// Re-export commonly used types
pub use aggregate::{AggregateGroup, aggregate};
pub use config::AppConfig;
pub use db::{Database, IncidentRecord, TrainingWindow};
pub use enrich::{DerivedIncident, EnrichError};
pub use ml::{BoosterParams, Evaluation, GradientBoostedRegressor, Objective, ScoredRow, TrainingError};
pub use pipeline::{PipelineOutcome, run, run_on_records};
pub use report::{BucketForecast, ForecastReport, ReportError};
pub use traits::{Clock, MockClock, SystemClock};
