//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `occutrack.toml` in the working directory (or the path in
//! `OCCUTRACK_CONFIG`). Every engine and infrastructure field has a sensible
//! default so the file is optional. Environment variables take precedence over
//! file values. The house layout itself (`[[areas]]`, `[adjacency]`,
//! `[[sensors]]`) only comes from the file.

use std::collections::BTreeMap;

use serde::Deserialize;

use occutrack_app::settings::TrackerSettings;
use occutrack_domain::area::Area;
use occutrack_domain::error::OccupancyError;
use occutrack_domain::layout::Layout;
use occutrack_domain::sensor::{Sensor, SensorKind};

const DEFAULT_CONFIG_PATH: &str = "occutrack.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine thresholds.
    pub engine: TrackerSettings,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Areas of the house.
    pub areas: Vec<AreaConfig>,
    /// Physical connections, listed from either side.
    pub adjacency: BTreeMap<String, Vec<String>>,
    /// Sensors and the areas they report into.
    pub sensors: Vec<SensorConfig>,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AreaConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exit_capable: bool,
    #[serde(default)]
    pub indoors: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    pub id: String,
    #[serde(default = "default_sensor_kind")]
    pub kind: SensorKind,
    pub areas: Vec<String>,
}

fn default_sensor_kind() -> SensorKind {
    SensorKind::Motion
}

impl Config {
    /// Load configuration from the config file (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// engine thresholds are inconsistent.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("OCCUTRACK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("OCCUTRACK_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("OCCUTRACK_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let engine = &self.engine;
        if engine.activity_window_secs == 0 {
            return Err(ConfigError::Validation(
                "engine.activity_window_secs must be non-zero".to_string(),
            ));
        }
        if engine.hard_reset_secs < engine.extended_occupancy_secs {
            return Err(ConfigError::Validation(
                "engine.hard_reset_secs must not be lower than engine.extended_occupancy_secs"
                    .to_string(),
            ));
        }
        if !engine.decay_rate.is_finite() || engine.decay_rate < 0.0 {
            return Err(ConfigError::Validation(
                "engine.decay_rate must be a non-negative number".to_string(),
            ));
        }
        if engine.history_retention == Some(0) {
            return Err(ConfigError::Validation(
                "engine.history_retention must keep at least one snapshot".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Build the validated [`Layout`] described by the file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Layout`] for empty or duplicate ids, unknown
    /// areas in sensor or adjacency entries, and sensors without areas.
    pub fn to_layout(&self) -> Result<Layout, ConfigError> {
        let mut builder = Layout::builder();
        for area in &self.areas {
            let mut area_builder = Area::builder()
                .id(area.id.as_str())
                .exit_capable(area.exit_capable);
            if let Some(name) = &area.name {
                area_builder = area_builder.name(name.as_str());
            }
            if let Some(indoors) = area.indoors {
                area_builder = area_builder.indoors(indoors);
            }
            builder = builder.area(area_builder.build()?);
        }
        for (area_id, neighbors) in &self.adjacency {
            builder = builder.adjacent(area_id.as_str(), neighbors.iter().map(String::as_str));
        }
        for sensor in &self.sensors {
            let sensor = sensor
                .areas
                .iter()
                .fold(
                    Sensor::builder().id(sensor.id.as_str()).kind(sensor.kind),
                    |b, area_id| b.area(area_id.as_str()),
                )
                .build()?;
            builder = builder.sensor(sensor);
        }
        Ok(builder.build()?)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:occutrack.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "occutrackd=info,occutrack_app=info,occutrack_adapter_storage_sqlite_sqlx=info"
                .to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// The house layout is inconsistent.
    #[error("invalid layout")]
    Layout(#[from] OccupancyError),
}
