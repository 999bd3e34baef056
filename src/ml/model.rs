//! Gradient-boosted regression trees for incident counts

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cart::{Node, SortedColumns, Tree, TreeBuilder, TreeConfig};
use super::metrics::r2_score;

/// Errors that can occur during model training
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainingError {
    #[error("Insufficient data for training: {0} samples")]
    InsufficientData(usize),
    #[error("Feature and target lengths mismatch: {features} vs {targets}")]
    MismatchedLengths { features: usize, targets: usize },
    #[error("Expected {expected} features per row, found {found}")]
    RaggedFeatures { expected: usize, found: usize },
    #[error("Invalid label {value} for objective {objective}")]
    InvalidLabel { value: f64, objective: &'static str },
    #[error("Invalid test split fraction: {0}")]
    InvalidSplit(f64),
    #[error("Invalid value for {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("No cell known for code {0}")]
    UnknownCode(usize),
}

/// Learning objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    /// Poisson regression with a log link
    #[serde(rename = "count:poisson")]
    Poisson,
    #[serde(rename = "reg:squarederror")]
    SquaredError,
}

impl Objective {
    pub fn as_str(&self) -> &'static str {
        match self {
            Objective::Poisson => "count:poisson",
            Objective::SquaredError => "reg:squarederror",
        }
    }

    /// Leaf weight bound; also inflates the Poisson hessian.
    fn max_delta_step(&self) -> f64 {
        match self {
            Objective::Poisson => 0.7,
            Objective::SquaredError => 0.0,
        }
    }

    fn check_labels(&self, targets: &[f64]) -> Result<(), TrainingError> {
        let invalid = match self {
            Objective::Poisson => targets.iter().find(|t| !t.is_finite() || **t < 0.0),
            Objective::SquaredError => targets.iter().find(|t| !t.is_finite()),
        };

        match invalid {
            Some(&value) => Err(TrainingError::InvalidLabel {
                value,
                objective: self.as_str(),
            }),
            None => Ok(()),
        }
    }

    fn base_margin(&self, targets: &[f64]) -> f64 {
        let mean = targets.iter().sum::<f64>() / targets.len() as f64;
        match self {
            // All-zero labels would give ln(0).
            Objective::Poisson => mean.max(1e-6).ln(),
            Objective::SquaredError => mean,
        }
    }

    /// First and second derivative of the loss at `margin`.
    fn gradient(&self, margin: f64, target: f64) -> (f64, f64) {
        match self {
            Objective::Poisson => (
                margin.exp() - target,
                (margin + self.max_delta_step()).exp(),
            ),
            Objective::SquaredError => (margin - target, 1.0),
        }
    }

    fn transform(&self, margin: f64) -> f64 {
        match self {
            Objective::Poisson => margin.exp(),
            Objective::SquaredError => margin,
        }
    }
}

/// Booster hyperparameters
#[derive(Debug, Clone, PartialEq)]
pub struct BoosterParams {
    pub objective: Objective,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Per-tree row sampling probability
    pub subsample: f64,
    /// Fraction of features offered to each tree
    pub colsample_bytree: f64,
    pub min_child_weight: f64,
    /// L2 penalty on leaf weights
    pub reg_lambda: f64,
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            objective: Objective::Poisson,
            n_estimators: 500,
            max_depth: 8,
            learning_rate: 0.05,
            subsample: 0.8,
            colsample_bytree: 0.8,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            seed: 42,
        }
    }
}

impl BoosterParams {
    fn validate(&self) -> Result<(), TrainingError> {
        let fractions = [
            ("learning_rate", self.learning_rate),
            ("subsample", self.subsample),
            ("colsample_bytree", self.colsample_bytree),
        ];
        for (name, value) in fractions {
            if !(value > 0.0 && value <= 1.0) {
                return Err(TrainingError::InvalidParameter { name, value });
            }
        }

        let non_negative = [
            ("min_child_weight", self.min_child_weight),
            ("reg_lambda", self.reg_lambda),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(TrainingError::InvalidParameter { name, value });
            }
        }

        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_child_weight: self.min_child_weight,
            reg_lambda: self.reg_lambda,
            max_delta_step: self.objective.max_delta_step(),
            learning_rate: self.learning_rate,
        }
    }
}

/// A fitted tree ensemble
#[derive(Debug, Clone, PartialEq)]
pub struct GradientBoostedRegressor {
    params: BoosterParams,
    base_margin: f64,
    n_features: usize,
    trees: Vec<Tree>,
}

impl GradientBoostedRegressor {
    /// Fit an ensemble on a row-major feature matrix.
    pub fn fit(params: &BoosterParams, features: &[Vec<f64>], targets: &[f64]) -> Result<Self, TrainingError> {
        if features.is_empty() || targets.is_empty() {
            return Err(TrainingError::InsufficientData(0));
        }
        if features.len() != targets.len() {
            return Err(TrainingError::MismatchedLengths {
                features: features.len(),
                targets: targets.len(),
            });
        }

        let n_features = features[0].len();
        if let Some(row) = features.iter().find(|r| r.len() != n_features) {
            return Err(TrainingError::RaggedFeatures {
                expected: n_features,
                found: row.len(),
            });
        }

        params.validate()?;
        let objective = params.objective;
        objective.check_labels(targets)?;

        let n_samples = features.len();
        let base_margin = objective.base_margin(targets);
        let mut margins = vec![base_margin; n_samples];

        let tree_config = params.tree_config();
        let sorted = SortedColumns::new(features, n_features);
        let builder = TreeBuilder::new(&tree_config, features, &sorted);

        let n_columns = ((params.colsample_bytree * n_features as f64).floor() as usize).clamp(1, n_features.max(1));
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut gradients = vec![0.0; n_samples];
        let mut hessians = vec![0.0; n_samples];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for round in 0..params.n_estimators {
            for i in 0..n_samples {
                let (g, h) = objective.gradient(margins[i], targets[i]);
                gradients[i] = g;
                hessians[i] = h;
            }

            let rows = sample_rows(&mut rng, n_samples, params.subsample);
            let columns = sample_columns(&mut rng, n_features, n_columns);

            let tree = builder.build(&gradients, &hessians, &rows, &columns);
            for (margin, row) in margins.iter_mut().zip(features) {
                *margin += tree.predict(row);
            }
            trees.push(tree);

            if (round + 1) % 100 == 0 {
                tracing::debug!("Boosting round {}/{}", round + 1, params.n_estimators);
            }
        }

        Ok(Self {
            params: params.clone(),
            base_margin,
            n_features,
            trees,
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let margin = self.base_margin + self.trees.iter().map(|t| t.predict(row)).sum::<f64>();
        self.params.objective.transform(margin)
    }

    pub fn predict(&self, features: &[Vec<f64>]) -> Vec<f64> {
        features.iter().map(|row| self.predict_row(row)).collect()
    }

    /// R² of the model's predictions against `targets`.
    pub fn score(&self, features: &[Vec<f64>], targets: &[f64]) -> f64 {
        r2_score(targets, &self.predict(features))
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn params(&self) -> &BoosterParams {
        &self.params
    }

    pub fn base_margin(&self) -> f64 {
        self.base_margin
    }

    /// How often each feature is used as a split across all trees.
    pub fn split_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_features];
        for node in self.trees.iter().flat_map(|t| &t.nodes) {
            if let Node::Split { feature, .. } = node {
                counts[*feature] += 1;
            }
        }
        counts
    }

    /// Get model information as a string
    pub fn info(&self) -> String {
        let leaves: usize = self.trees.iter().map(Tree::leaf_count).sum();
        format!(
            "GradientBoostedRegressor(objective={}, trees={}, leaves={}, max_depth={}, eta={})",
            self.params.objective.as_str(),
            self.trees.len(),
            leaves,
            self.params.max_depth,
            self.params.learning_rate
        )
    }
}

/// Bernoulli row sample; every row when `subsample` is 1.
fn sample_rows(rng: &mut StdRng, n_samples: usize, subsample: f64) -> Vec<usize> {
    if subsample >= 1.0 {
        return (0..n_samples).collect();
    }
    (0..n_samples).filter(|_| rng.r#gen::<f64>() < subsample).collect()
}

/// Sorted random subset of `n_columns` feature indices.
fn sample_columns(rng: &mut StdRng, n_features: usize, n_columns: usize) -> Vec<usize> {
    let mut columns: Vec<usize> = (0..n_features).collect();
    if n_columns >= n_features {
        return columns;
    }
    columns.shuffle(rng);
    columns.truncate(n_columns);
    columns.sort_unstable();
    columns
}
