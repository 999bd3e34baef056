//! Weekly forecast report: 7 days by 24 hours of predicted and observed
//! incident counts.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;

use crate::ml::ScoredRow;

pub const DAYS_PER_WEEK: usize = 7;
pub const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Forecast for one (day, hour) bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BucketForecast {
    pub predicted_incident_count: i64,
    pub true_incident_count: i64,
    /// Distinct cells seen in the bucket, sorted
    pub h3_index: Vec<String>,
}

/// One weekday; index `h` holds hour `h`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayForecast {
    pub hours: Vec<BucketForecast>,
}

/// The full week; index `d` holds weekday `d + 1` (1 = Sunday).
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastReport {
    pub days: Vec<DayForecast>,
}

#[derive(Default)]
struct BucketTotals {
    predicted: f64,
    actual: f64,
    cells: BTreeSet<String>,
}

impl ForecastReport {
    /// Group scored rows by (day, hour). Sums are truncated toward zero
    /// only after summation; empty buckets are zero-filled.
    pub fn from_scored(rows: &[ScoredRow]) -> Self {
        let mut totals: Vec<Vec<BucketTotals>> = (0..DAYS_PER_WEEK)
            .map(|_| (0..HOURS_PER_DAY).map(|_| BucketTotals::default()).collect())
            .collect();

        for row in rows {
            let Some(bucket) = (row.day_of_week as usize)
                .checked_sub(1)
                .and_then(|d| totals.get_mut(d))
                .and_then(|day| day.get_mut(row.hour_of_day as usize))
            else {
                tracing::warn!(
                    "Dropping row outside the weekly grid: day={} hour={}",
                    row.day_of_week,
                    row.hour_of_day
                );
                continue;
            };
            bucket.predicted += row.predicted;
            bucket.actual += row.actual;
            bucket.cells.insert(row.h3_index.clone());
        }

        let days = totals
            .into_iter()
            .map(|hours| DayForecast {
                hours: hours
                    .into_iter()
                    .map(|t| BucketForecast {
                        predicted_incident_count: t.predicted as i64,
                        true_incident_count: t.actual as i64,
                        h3_index: t.cells.into_iter().collect(),
                    })
                    .collect(),
            })
            .collect();

        Self { days }
    }

    /// Bucket for weekday `day` (1..=7) and `hour` (0..=23).
    pub fn bucket(&self, day: u32, hour: u32) -> Option<&BucketForecast> {
        let day = (day as usize).checked_sub(1)?;
        self.days.get(day)?.hours.get(hour as usize)
    }

    pub fn total_predicted(&self) -> i64 {
        self.buckets().map(|b| b.predicted_incident_count).sum()
    }

    pub fn total_observed(&self) -> i64 {
        self.buckets().map(|b| b.true_incident_count).sum()
    }

    fn buckets(&self) -> impl Iterator<Item = &BucketForecast> {
        self.days.iter().flat_map(|d| d.hours.iter())
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON, replacing any existing file.
    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        let io_error = |source| ReportError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let json = self.to_json()?;
        fs::write(path, json).map_err(io_error)?;
        Ok(())
    }
}

impl Serialize for DayForecast {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.hours.len()))?;
        for (hour, bucket) in self.hours.iter().enumerate() {
            map.serialize_entry(&hour.to_string(), bucket)?;
        }
        map.end()
    }
}

impl Serialize for ForecastReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.days.len()))?;
        for (idx, day) in self.days.iter().enumerate() {
            map.serialize_entry(&(idx + 1).to_string(), day)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tempfile::TempDir;

    use super::*;

    fn row(day: u32, hour: u32, cell: &str, predicted: f64, actual: f64) -> ScoredRow {
        ScoredRow {
            day_of_week: day,
            hour_of_day: hour,
            h3_index: cell.to_string(),
            predicted,
            actual,
        }
    }

    #[test]
    fn test_empty_report_is_complete_and_zeroed() {
        let report = ForecastReport::from_scored(&[]);

        assert_eq!(report.days.len(), DAYS_PER_WEEK);
        for day in &report.days {
            assert_eq!(day.hours.len(), HOURS_PER_DAY);
            assert!(day.hours.iter().all(|b| *b == BucketForecast::default()));
        }
        assert_eq!(report.total_predicted(), 0);
    }

    #[test]
    fn test_sums_truncate_after_summation() {
        let rows = vec![
            row(3, 14, "b", 1.6, 1.0),
            row(3, 14, "a", 1.6, 2.0),
            row(3, 14, "b", 0.7, 1.0),
        ];

        let report = ForecastReport::from_scored(&rows);
        let bucket = report.bucket(3, 14).unwrap();

        // 1.6 + 1.6 + 0.7 = 3.9, truncated to 3; per-row truncation would give 2.
        assert_eq!(bucket.predicted_incident_count, 3);
        assert_eq!(bucket.true_incident_count, 4);
        assert_eq!(bucket.h3_index, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_other_buckets_untouched() {
        let report = ForecastReport::from_scored(&[row(1, 0, "a", 2.0, 2.0)]);

        let non_empty = report
            .days
            .iter()
            .flat_map(|d| d.hours.iter())
            .filter(|b| **b != BucketForecast::default())
            .count();
        assert_eq!(non_empty, 1);
        assert_eq!(report.bucket(1, 0).unwrap().true_incident_count, 2);
    }

    #[test]
    fn test_out_of_grid_rows_are_dropped() {
        let report = ForecastReport::from_scored(&[row(0, 3, "a", 1.0, 1.0), row(8, 3, "a", 1.0, 1.0)]);
        assert_eq!(report.total_observed(), 0);
        assert!(report.bucket(0, 3).is_none());
        assert!(report.bucket(7, 24).is_none());
    }

    #[test]
    fn test_json_shape_and_key_order() {
        let report = ForecastReport::from_scored(&[row(7, 23, "a", 1.2, 1.0)]);
        let json = report.to_json().unwrap();

        let value: Value = serde_json::from_str(&json).unwrap();
        let days = value.as_object().unwrap();
        assert_eq!(days.len(), 7);
        for day in days.values() {
            assert_eq!(day.as_object().unwrap().len(), 24);
        }
        assert_eq!(value["7"]["23"]["predicted_incident_count"], 1);
        assert_eq!(value["7"]["23"]["h3_index"][0], "a");

        // Numeric order, not lexical: "2" comes before "10".
        let pos_2 = json.find("\"2\": {").unwrap();
        let pos_10 = json.find("\"10\": {").unwrap();
        assert!(pos_2 < pos_10);
        assert!(json.starts_with("{\n  \"1\": {\n    \"0\": {"));
    }

    #[test]
    fn test_write_json_creates_parents_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.json");

        ForecastReport::from_scored(&[row(2, 5, "a", 9.0, 9.0)]).write_json(&path).unwrap();
        ForecastReport::from_scored(&[]).write_json(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["2"]["5"]["true_incident_count"], 0);
        assert!(!text.ends_with('\n'));
    }
}
