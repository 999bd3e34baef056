//! Feature vectors fed to the count model

/// Model inputs for one (cell, weekday, hour) group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastFeatures {
    pub day_of_week: f64,
    pub hour_of_day: f64,
    pub h3_index_encoded: f64,
    /// NaN when the group has no closed incidents
    pub avg_duration_hours: f64,
}

impl ForecastFeatures {
    /// Number of features
    pub const NUM_FEATURES: usize = 4;

    pub fn new(
        day_of_week: u32,
        hour_of_day: u32,
        h3_index_encoded: usize,
        avg_duration_hours: Option<f64>,
    ) -> Self {
        Self {
            day_of_week: day_of_week as f64,
            hour_of_day: hour_of_day as f64,
            h3_index_encoded: h3_index_encoded as f64,
            avg_duration_hours: avg_duration_hours.unwrap_or(f64::NAN),
        }
    }

    /// Convert features to a vector for the ML model
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.day_of_week,
            self.hour_of_day,
            self.h3_index_encoded,
            self.avg_duration_hours,
        ]
    }

    /// Feature names for debugging/logging
    pub fn feature_names() -> Vec<&'static str> {
        vec![
            "day_of_week",
            "hour_of_day",
            "h3_index_encoded",
            "avg_duration_hours",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_features_to_vec() {
        let features = ForecastFeatures::new(3, 14, 7, Some(1.5));
        assert_eq!(features.to_vec(), vec![3.0, 14.0, 7.0, 1.5]);
        assert_eq!(features.to_vec().len(), ForecastFeatures::NUM_FEATURES);
    }

    #[test]
    fn test_missing_duration_is_nan() {
        let features = ForecastFeatures::new(1, 0, 0, None);
        assert!(features.avg_duration_hours.is_nan());
    }

    #[test]
    fn test_feature_names_count() {
        let names = ForecastFeatures::feature_names();
        assert_eq!(names.len(), ForecastFeatures::NUM_FEATURES);
        assert_eq!(names[2], "h3_index_encoded");
    }
}
