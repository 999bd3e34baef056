//! Grouping of derived incidents into (cell, weekday, hour) buckets.

use std::collections::BTreeMap;

use crate::enrich::DerivedIncident;

/// Incidents sharing one `(h3_index, day_of_week, hour_of_day)` key.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateGroup {
    pub h3_index: String,
    pub day_of_week: u32,
    pub hour_of_day: u32,
    pub incident_count: u64,
    /// Mean over the non-null durations; `None` if every incident in the
    /// group is still open.
    pub avg_duration_hours: Option<f64>,
}

#[derive(Default)]
struct GroupAccumulator {
    count: u64,
    duration_sum: f64,
    duration_count: u64,
}

/// Group incidents by cell and time bucket.
///
/// Groups come back in key order so repeated runs see identical rows.
pub fn aggregate(incidents: &[DerivedIncident]) -> Vec<AggregateGroup> {
    let mut groups: BTreeMap<(&str, u32, u32), GroupAccumulator> = BTreeMap::new();

    for incident in incidents {
        let key = (
            incident.h3_index.as_str(),
            incident.day_of_week,
            incident.hour_of_day,
        );
        let acc = groups.entry(key).or_default();
        acc.count += 1;
        if let Some(hours) = incident.duration_hours {
            acc.duration_sum += hours;
            acc.duration_count += 1;
        }
    }

    groups
        .into_iter()
        .map(|((h3_index, day_of_week, hour_of_day), acc)| AggregateGroup {
            h3_index: h3_index.to_string(),
            day_of_week,
            hour_of_day,
            incident_count: acc.count,
            avg_duration_hours: (acc.duration_count > 0)
                .then(|| acc.duration_sum / acc.duration_count as f64),
        })
        .collect()
}

/// Log the first `n` groups as a quick sanity check of the table.
pub fn preview(groups: &[AggregateGroup], n: usize) {
    tracing::info!("Aggregated {} groups; first {}:", groups.len(), n.min(groups.len()));
    for group in groups.iter().take(n) {
        tracing::info!(
            "  {} day={} hour={} count={} avg_duration_hours={}",
            group.h3_index,
            group.day_of_week,
            group.hour_of_day,
            group.incident_count,
            group
                .avg_duration_hours
                .map(|h| format!("{:.2}", h))
                .unwrap_or_else(|| "null".to_string())
        );
    }
}
