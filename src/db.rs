use anyhow::{Context, Result};
use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use crate::config::DatabaseConfig;
use crate::traits::Clock;

/// A single geotagged incident as stored in the `incidents` table.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct IncidentRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub declared_at: NaiveDateTime,
    /// Still-open incidents have no close time.
    pub closed_at: Option<NaiveDateTime>,
}

/// Half-open `[start, end)` range of declaration dates to train on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TrainingWindow {
    /// The last two full calendar months before `today`.
    ///
    /// Starts on the first day of the month two months back and ends
    /// (exclusive) on the first day of the current month.
    pub fn for_date(today: NaiveDate) -> Self {
        let end = today.with_day(1).unwrap_or(today);
        let start = end.checked_sub_months(Months::new(2)).unwrap_or(end);
        Self { start, end }
    }

    pub fn current<C: Clock + ?Sized>(clock: &C) -> Self {
        Self::for_date(clock.today())
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        let date = timestamp.date();
        date >= self.start && date < self.end
    }
}

#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open a connection to the incident store.
    ///
    /// The job issues a single query, so one connection is all it holds.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(config.connect_options())
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to PostgreSQL at {}:{}/{}",
                    config.host, config.port, config.name
                )
            })?;

        Ok(Self { pool })
    }

    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL database")?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Fetch every incident declared inside the window.
    pub async fn fetch_incidents(&self, window: &TrainingWindow) -> Result<Vec<IncidentRecord>> {
        let start = window.start.and_time(chrono::NaiveTime::MIN);
        let end = window.end.and_time(chrono::NaiveTime::MIN);

        let incidents = sqlx::query_as::<_, IncidentRecord>(
            r#"
            SELECT
                location_latt::float8 AS latitude,
                location_long::float8 AS longitude,
                declared_at::timestamp AS declared_at,
                closed_at::timestamp AS closed_at
            FROM incidents
            WHERE declared_at >= $1 AND declared_at < $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .with_context(|| {
            format!(
                "Failed to fetch incidents declared between {} and {}",
                window.start, window.end
            )
        })?;

        Ok(incidents)
    }
}
