use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

use crate::ml::{BoosterParams, Objective};

/// Default file the forecast report is written to.
pub const DEFAULT_REPORT_PATH: &str = "grouped_h3_by_day_structured.json";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub features: FeaturesConfig,
    pub split: SplitConfig,
    pub model: ModelConfig,
    pub report: ReportConfig,
}

/// Postgres credentials, sourced from the `DB_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl DatabaseConfig {
    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key).with_context(|| {
                format!("{key} must be set (via .env file or environment variable)")
            })
        };

        let port = require("DB_PORT")?;
        let port = port
            .trim()
            .parse::<u16>()
            .with_context(|| format!("DB_PORT is not a valid port: {port:?}"))?;

        Ok(Self {
            host: require("DB_HOST")?,
            port,
            name: require("DB_NAME")?,
            user: require("DB_USER")?,
            password: require("DB_PASSWORD")?,
        })
    }

    /// Connection options for the sqlx Postgres driver.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeaturesConfig {
    /// H3 resolution used for the spatial cell of each incident
    pub h3_resolution: u8,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self { h3_resolution: 9 }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SplitConfig {
    /// Fraction of aggregated rows held out as the test partition
    pub test_size: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub objective: Objective,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    pub seed: u64,
}

impl Default for ModelConfig {
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

impl From<&ModelConfig> for BoosterParams {
    fn from(config: &ModelConfig) -> Self {
        Self {
            objective: config.objective,
            n_estimators: config.n_estimators,
            max_depth: config.max_depth,
            learning_rate: config.learning_rate,
            subsample: config.subsample,
            colsample_bytree: config.colsample_bytree,
            min_child_weight: config.min_child_weight,
            reg_lambda: config.reg_lambda,
            seed: config.seed,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    pub output_path: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_REPORT_PATH),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present - production uses env vars directly)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig::from_env()?;
        Self::load_with_database(database)
    }

    /// Build the layered configuration around already-resolved credentials.
    pub fn load_with_database(database: DatabaseConfig) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("incident-forecast");

        let model = ModelConfig::default();

        let builder = Config::builder()
            // 1. Defaults
            // Database (resolved from DB_* above)
            .set_default("database.host", database.host)?
            .set_default("database.port", i64::from(database.port))?
            .set_default("database.name", database.name)?
            .set_default("database.user", database.user)?
            .set_default("database.password", database.password)?
            // Features
            .set_default("features.h3_resolution", 9)?
            // Split
            .set_default("split.test_size", 0.2)?
            .set_default("split.seed", 42)?
            // Model
            .set_default("model.objective", model.objective.as_str())?
            .set_default("model.n_estimators", model.n_estimators as u64)?
            .set_default("model.max_depth", model.max_depth as u64)?
            .set_default("model.learning_rate", model.learning_rate)?
            .set_default("model.subsample", model.subsample)?
            .set_default("model.colsample_bytree", model.colsample_bytree)?
            .set_default("model.min_child_weight", model.min_child_weight)?
            .set_default("model.reg_lambda", model.reg_lambda)?
            .set_default("model.seed", model.seed)?
            // Report
            .set_default("report.output_path", DEFAULT_REPORT_PATH)?

            // 2. Local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))

            // 3. User config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))

            // 4. Environment variables (FORECAST__MODEL__N_ESTIMATORS=...)
            .add_source(Environment::with_prefix("FORECAST").separator("__"));

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }

    /// Built-in defaults only, no files or environment.
    pub fn with_defaults(database: DatabaseConfig) -> Self {
        Self {
            database,
            features: FeaturesConfig::default(),
            split: SplitConfig::default(),
            model: ModelConfig::default(),
            report: ReportConfig::default(),
        }
    }
}
