//! Per-incident feature derivation
//!
//! Turns a raw incident into its spatio-temporal features: weekday and hour
//! of the declaration, how long the incident stayed open, and the H3 cell it
//! falls in.

use chrono::{Datelike, NaiveDateTime, Timelike};
use h3o::{LatLng, Resolution};
use thiserror::Error;

use crate::db::IncidentRecord;

/// Resolution used for incident cells unless configured otherwise.
pub const DEFAULT_RESOLUTION: Resolution = Resolution::Nine;

/// Incident plus its derived features.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedIncident {
    pub record: IncidentRecord,
    /// 1 = Sunday ... 7 = Saturday
    pub day_of_week: u32,
    /// 0-23
    pub hour_of_day: u32,
    /// `None` while the incident is still open. Negative when the close
    /// time precedes the declaration.
    pub duration_hours: Option<f64>,
    pub h3_index: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnrichError {
    #[error("cannot index coordinates ({latitude}, {longitude}): {reason}")]
    InvalidCoordinate {
        latitude: f64,
        longitude: f64,
        reason: String,
    },
    #[error("invalid H3 resolution: {0}")]
    InvalidResolution(u8),
}

/// Parse a configured resolution level.
pub fn resolution(level: u8) -> Result<Resolution, EnrichError> {
    Resolution::try_from(level).map_err(|_| EnrichError::InvalidResolution(level))
}

/// Day of week with Sunday as 1, Saturday as 7.
pub fn day_of_week(timestamp: &NaiveDateTime) -> u32 {
    timestamp.weekday().number_from_sunday()
}

/// Hours between declaration and close, each floored to whole seconds
/// before subtracting.
pub fn duration_hours(declared_at: &NaiveDateTime, closed_at: Option<&NaiveDateTime>) -> Option<f64> {
    closed_at.map(|closed| {
        let seconds = closed.and_utc().timestamp() - declared_at.and_utc().timestamp();
        seconds as f64 / 3600.0
    })
}

/// H3 cell (hex string form) containing the given coordinates.
pub fn cell_for(latitude: f64, longitude: f64, resolution: Resolution) -> Result<String, EnrichError> {
    let coord = LatLng::new(latitude, longitude).map_err(|e| EnrichError::InvalidCoordinate {
        latitude,
        longitude,
        reason: e.to_string(),
    })?;
    Ok(coord.to_cell(resolution).to_string())
}

pub fn derive(record: &IncidentRecord, resolution: Resolution) -> Result<DerivedIncident, EnrichError> {
    let h3_index = cell_for(record.latitude, record.longitude, resolution)?;

    Ok(DerivedIncident {
        day_of_week: day_of_week(&record.declared_at),
        hour_of_day: record.declared_at.hour(),
        duration_hours: duration_hours(&record.declared_at, record.closed_at.as_ref()),
        h3_index,
        record: record.clone(),
    })
}

/// Derive features for every record, failing on the first bad one.
pub fn derive_all(records: &[IncidentRecord], resolution: Resolution) -> Result<Vec<DerivedIncident>, EnrichError> {
    let derived = records
        .iter()
        .map(|record| derive(record, resolution))
        .collect::<Result<Vec<_>, _>>()?;

    let negative = derived
        .iter()
        .filter(|d| d.duration_hours.is_some_and(|h| h < 0.0))
        .count();
    if negative > 0 {
        tracing::warn!("{} incidents were closed before they were declared", negative);
    }

    Ok(derived)
}
