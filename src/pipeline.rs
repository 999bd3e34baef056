//! End-to-end forecast job: load, derive, aggregate, train, report.

use anyhow::{Context, Result};

use crate::aggregate::{self, AggregateGroup};
use crate::config::AppConfig;
use crate::db::{Database, IncidentRecord, TrainingWindow};
use crate::enrich;
use crate::ml::{train_forecast, BoosterParams, Evaluation};
use crate::report::ForecastReport;
use crate::traits::Clock;

/// Number of aggregated groups logged as a preview.
const PREVIEW_ROWS: usize = 5;

/// Everything a run produced.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub incident_count: usize,
    pub groups: Vec<AggregateGroup>,
    pub train_size: usize,
    pub test_size: usize,
    pub evaluation: Evaluation,
    pub report: ForecastReport,
}

/// Run every stage after loading on an in-memory batch of incidents.
pub fn run_on_records(records: &[IncidentRecord], config: &AppConfig) -> Result<PipelineOutcome> {
    let resolution = enrich::resolution(config.features.h3_resolution)?;
    let derived = enrich::derive_all(records, resolution).context("Failed to derive incident features")?;
    tracing::info!("Derived features for {} incidents", derived.len());

    let groups = aggregate::aggregate(&derived);
    aggregate::preview(&groups, PREVIEW_ROWS);

    let params = BoosterParams::from(&config.model);
    let training =
        train_forecast(groups.clone(), &config.split, &params).context("Failed to train forecast model")?;

    let report = ForecastReport::from_scored(&training.scored);
    tracing::info!(
        "Report covers {} predicted and {} observed incidents",
        report.total_predicted(),
        report.total_observed()
    );

    Ok(PipelineOutcome {
        incident_count: records.len(),
        groups,
        train_size: training.train_size,
        test_size: training.test_size,
        evaluation: training.evaluation,
        report,
    })
}

/// Full run against the database, writing the report file.
pub async fn run(config: &AppConfig, clock: &dyn Clock) -> Result<PipelineOutcome> {
    tracing::info!("Forecast run started at {}", clock.now_utc().format("%Y-%m-%d %H:%M:%S UTC"));
    let window = TrainingWindow::current(clock);
    tracing::info!("Training window: {} to {} (exclusive)", window.start, window.end);

    tracing::info!("Connecting to database...");
    let database = Database::connect(&config.database).await?;
    let records = database.fetch_incidents(&window).await?;
    database.pool().close().await;
    tracing::info!("Loaded {} incidents", records.len());

    let outcome = run_on_records(&records, config)?;

    let path = &config.report.output_path;
    outcome
        .report
        .write_json(path)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    tracing::info!("Wrote forecast report to {}", path.display());

    Ok(outcome)
}
