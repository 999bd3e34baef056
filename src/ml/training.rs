//! Training pipeline: encode, split, fit, evaluate

use crate::aggregate::AggregateGroup;
use crate::config::SplitConfig;

use super::dataset::EncodedDataset;
use super::features::ForecastFeatures;
use super::metrics::Evaluation;
use super::model::{BoosterParams, GradientBoostedRegressor, TrainingError};

/// A training-partition row with its prediction, ready for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub day_of_week: u32,
    pub hour_of_day: u32,
    pub h3_index: String,
    pub predicted: f64,
    pub actual: f64,
}

/// Result of a training run
#[derive(Debug)]
pub struct TrainingResult {
    pub model: GradientBoostedRegressor,
    pub evaluation: Evaluation,
    /// One entry per training row, in split order
    pub scored: Vec<ScoredRow>,
    pub train_size: usize,
    pub test_size: usize,
}

/// Fit the count model on the training partition of `groups`.
pub fn train_forecast(
    groups: Vec<AggregateGroup>,
    split: &SplitConfig,
    params: &BoosterParams,
) -> Result<TrainingResult, TrainingError> {
    let dataset = EncodedDataset::from_groups(groups);
    if dataset.is_empty() {
        return Err(TrainingError::InsufficientData(0));
    }
    tracing::info!(
        "Encoded {} groups over {} distinct cells",
        dataset.len(),
        dataset.encoder.len()
    );

    let partition = dataset.split(split.test_size, split.seed)?;
    let train_x = partition.train_features();
    let train_y = partition.train_targets();
    tracing::info!(
        "Split into {} training and {} test rows",
        partition.train.len(),
        partition.test.len()
    );

    let model = GradientBoostedRegressor::fit(params, &train_x, &train_y)?;
    tracing::info!("Trained {}", model.info());

    let names = ForecastFeatures::feature_names();
    for (name, count) in names.iter().zip(model.split_counts()) {
        tracing::debug!("  splits on {}: {}", name, count);
    }

    let train_predictions = model.predict(&train_x);
    // Test predictions are computed but not scored or reported.
    let test_predictions = model.predict(&partition.test_features());
    tracing::debug!("Predicted {} test rows", test_predictions.len());

    let global_r2 = model.score(&dataset.features(), &dataset.targets());
    let evaluation = Evaluation::on_train(&train_y, &train_predictions, global_r2);

    let scored = partition
        .train_rows()
        .zip(&train_predictions)
        .map(|(row, &predicted)| {
            let h3_index = dataset
                .encoder
                .decode(row.h3_index_encoded)
                .ok_or(TrainingError::UnknownCode(row.h3_index_encoded))?;
            Ok(ScoredRow {
                day_of_week: row.group.day_of_week,
                hour_of_day: row.group.hour_of_day,
                h3_index: h3_index.to_string(),
                predicted,
                actual: row.target(),
            })
        })
        .collect::<Result<Vec<_>, TrainingError>>()?;

    Ok(TrainingResult {
        model,
        evaluation,
        scored,
        train_size: partition.train.len(),
        test_size: partition.test.len(),
    })
}
