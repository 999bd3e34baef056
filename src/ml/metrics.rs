//! Regression metrics

use std::fmt;

/// Mean absolute error; NaN for empty or mismatched input.
pub fn mean_absolute_error(targets: &[f64], predictions: &[f64]) -> f64 {
    if targets.is_empty() || targets.len() != predictions.len() {
        return f64::NAN;
    }

    let sum: f64 = targets
        .iter()
        .zip(predictions)
        .map(|(t, p)| (t - p).abs())
        .sum();

    sum / targets.len() as f64
}

/// Mean squared error; NaN for empty or mismatched input.
pub fn mean_squared_error(targets: &[f64], predictions: &[f64]) -> f64 {
    if targets.is_empty() || targets.len() != predictions.len() {
        return f64::NAN;
    }

    let sum: f64 = targets
        .iter()
        .zip(predictions)
        .map(|(t, p)| (t - p).powi(2))
        .sum();

    sum / targets.len() as f64
}

/// Coefficient of determination.
///
/// Undefined (NaN) below two samples. With constant targets the score is
/// 1.0 for a perfect fit and 0.0 otherwise.
pub fn r2_score(targets: &[f64], predictions: &[f64]) -> f64 {
    if targets.len() < 2 || targets.len() != predictions.len() {
        return f64::NAN;
    }

    let mean = targets.iter().sum::<f64>() / targets.len() as f64;
    let ss_res: f64 = targets
        .iter()
        .zip(predictions)
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = targets.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }

    1.0 - ss_res / ss_tot
}

/// Fit quality of one training run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub train_mae: f64,
    pub train_mse: f64,
    pub train_r2: f64,
    /// R² over the train and test partitions together
    pub global_r2: f64,
}

impl Evaluation {
    pub fn on_train(targets: &[f64], predictions: &[f64], global_r2: f64) -> Self {
        Self {
            train_mae: mean_absolute_error(targets, predictions),
            train_mse: mean_squared_error(targets, predictions),
            train_r2: r2_score(targets, predictions),
            global_r2,
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Train MAE: {:.2}", self.train_mae)?;
        writeln!(f, "Train MSE: {:.2}", self.train_mse)?;
        writeln!(f, "Train R²: {:.2}", self.train_r2)?;
        write!(f, "Model score (R²): {}", self.global_r2)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_mae_and_mse() {
        let targets = [12.0, 18.0, 32.0];
        let predictions = [10.0, 20.0, 30.0];

        assert_relative_eq!(mean_absolute_error(&targets, &predictions), 2.0);
        assert_relative_eq!(mean_squared_error(&targets, &predictions), 4.0);
    }

    #[test]
    fn test_empty_input_is_nan() {
        assert!(mean_absolute_error(&[], &[]).is_nan());
        assert!(mean_squared_error(&[], &[]).is_nan());
        assert!(mean_squared_error(&[1.0], &[1.0, 2.0]).is_nan());
    }

    #[test]
    fn test_r2_perfect_and_mean() {
        let targets = [1.0, 2.0, 3.0, 4.0];

        assert_relative_eq!(r2_score(&targets, &targets), 1.0);
        assert_relative_eq!(r2_score(&targets, &[2.5; 4]), 0.0);
    }

    #[test]
    fn test_r2_can_be_negative() {
        let targets = [1.0, 2.0, 3.0];
        let predictions = [3.0, 2.0, 1.0];

        // ss_res = 8, ss_tot = 2
        assert_relative_eq!(r2_score(&targets, &predictions), -3.0);
    }

    #[test]
    fn test_r2_undefined_for_single_sample() {
        assert!(r2_score(&[3.0], &[3.0]).is_nan());
        assert!(r2_score(&[], &[]).is_nan());
    }

    #[test]
    fn test_r2_constant_targets() {
        assert_relative_eq!(r2_score(&[3.0, 3.0], &[3.0, 3.0]), 1.0);
        assert_relative_eq!(r2_score(&[3.0, 3.0], &[2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_evaluation_display() {
        let eval = Evaluation {
            train_mae: 0.123,
            train_mse: 1.0,
            train_r2: 0.876,
            global_r2: 0.5,
        };

        let text = eval.to_string();
        assert!(text.contains("Train MAE: 0.12"));
        assert!(text.contains("Train MSE: 1.00"));
        assert!(text.contains("Train R²: 0.88"));
        assert!(text.contains("Model score (R²): 0.5"));
    }

    #[test]
    fn test_evaluation_on_train() {
        let eval = Evaluation::on_train(&[1.0, 3.0], &[1.0, 3.0], 0.9);

        assert_relative_eq!(eval.train_mae, 0.0);
        assert_relative_eq!(eval.train_mse, 0.0);
        assert_relative_eq!(eval.train_r2, 1.0);
        assert_relative_eq!(eval.global_r2, 0.9);
    }
}
