//! Encoded training table and its train/test partition

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::aggregate::AggregateGroup;

use super::encoder::LabelEncoder;
use super::features::ForecastFeatures;
use super::model::TrainingError;

/// Aggregate group with its cell id mapped to an integer code.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRow {
    pub group: AggregateGroup,
    pub h3_index_encoded: usize,
}

impl EncodedRow {
    pub fn features(&self) -> ForecastFeatures {
        ForecastFeatures::new(
            self.group.day_of_week,
            self.group.hour_of_day,
            self.h3_index_encoded,
            self.group.avg_duration_hours,
        )
    }

    pub fn target(&self) -> f64 {
        self.group.incident_count as f64
    }
}

/// The full encoded table plus the encoder needed to decode it.
#[derive(Debug, Clone)]
pub struct EncodedDataset {
    pub rows: Vec<EncodedRow>,
    pub encoder: LabelEncoder,
}

impl EncodedDataset {
    pub fn from_groups(groups: Vec<AggregateGroup>) -> Self {
        let encoder = LabelEncoder::fit(groups.iter().map(|g| g.h3_index.as_str()));

        let rows = groups
            .into_iter()
            .map(|group| {
                // Every group's cell was part of the fit above.
                let h3_index_encoded = encoder.encode(&group.h3_index).unwrap_or_default();
                EncodedRow {
                    group,
                    h3_index_encoded,
                }
            })
            .collect();

        Self { rows, encoder }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row-major feature matrix
    pub fn features(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| r.features().to_vec()).collect()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.rows.iter().map(EncodedRow::target).collect()
    }

    /// Partition rows into train and test sets.
    pub fn split(&self, test_size: f64, seed: u64) -> Result<TrainTestSplit<'_>, TrainingError> {
        let (train, test) = train_test_split(self.len(), test_size, seed)?;
        Ok(TrainTestSplit {
            dataset: self,
            train,
            test,
        })
    }
}

/// Index-based view of a dataset split.
#[derive(Debug, Clone)]
pub struct TrainTestSplit<'a> {
    dataset: &'a EncodedDataset,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl<'a> TrainTestSplit<'a> {
    pub fn train_rows(&self) -> impl Iterator<Item = &'a EncodedRow> + '_ {
        let dataset = self.dataset;
        self.train.iter().map(move |&i| &dataset.rows[i])
    }

    pub fn test_rows(&self) -> impl Iterator<Item = &'a EncodedRow> + '_ {
        let dataset = self.dataset;
        self.test.iter().map(move |&i| &dataset.rows[i])
    }

    pub fn train_features(&self) -> Vec<Vec<f64>> {
        self.train_rows().map(|r| r.features().to_vec()).collect()
    }

    pub fn train_targets(&self) -> Vec<f64> {
        self.train_rows().map(EncodedRow::target).collect()
    }

    pub fn test_features(&self) -> Vec<Vec<f64>> {
        self.test_rows().map(|r| r.features().to_vec()).collect()
    }
}

/// Shuffle `0..n` with a seeded RNG and cut it into (train, test) indices.
///
/// The test side takes `ceil(test_size * n)` rows, but never all of them:
/// at least one row is always left to train on.
pub fn train_test_split(
    n: usize,
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), TrainingError> {
    if !(0.0..1.0).contains(&test_size) {
        return Err(TrainingError::InvalidSplit(test_size));
    }
    if n == 0 {
        return Err(TrainingError::InsufficientData(0));
    }

    let n_test = ((test_size * n as f64).ceil() as usize).min(n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}
