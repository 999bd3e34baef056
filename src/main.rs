use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use incident_forecast::{SystemClock, config::AppConfig, pipeline};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "incident-forecast")]
#[command(about = "Forecast incident counts per H3 cell, weekday and hour")]
struct Args {
    /// Where to write the JSON report (overrides configuration)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging (RUST_LOG replaces the crate directive)
    let directives =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "incident_forecast=debug".to_string());
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy(directives);

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(output) = args.output {
        config.report.output_path = output;
    }

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    let outcome = rt.block_on(async {
        tracing::info!("Starting incident forecast");
        pipeline::run(&config, &SystemClock).await
    })?;

    println!("=== Model metrics ===");
    println!("{}", outcome.evaluation);

    Ok(())
}
