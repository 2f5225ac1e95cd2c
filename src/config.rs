//! Configuration management for `AquaRoute`
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::RouteError;
use crate::cost::CostModelConfig;
use crate::grid::{BoundingBox, GridIndexer};
use crate::ingest::{IngestionMode, IngestionOptions};
use crate::pathfinding::{Heuristic, RetryPolicy};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on simultaneous weather fetches
pub const MAX_CONCURRENCY_LIMIT: usize = 10_000;

/// Root configuration structure for the `AquaRoute` application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Weather provider configuration
    pub weather: WeatherConfig,
    /// Grid cost store configuration
    pub cache: CacheConfig,
    /// Ingestion run settings
    pub ingestion: IngestionConfig,
    /// Route search settings
    pub routing: RoutingConfig,
    /// Cost model coefficients, bounds and floor
    pub cost: CostModelConfig,
    /// Land mask source
    pub land: LandConfig,
    /// HTTP server settings
    pub server: ServerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Weather API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key, required for any live fetch
    pub api_key: Option<String>,
    /// Current-weather endpoint
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_weather_timeout")]
    pub timeout_seconds: u32,
    /// Retries for transient failures; off by default
    #[serde(default)]
    pub max_retries: u32,
}

/// Grid cost store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Store directory location
    #[serde(default = "default_cache_location")]
    pub location: String,
}

/// Ingestion region bounds, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub lat_min: f64,
    pub lon_min: f64,
    pub lat_max: f64,
    pub lon_max: f64,
}

/// Ingestion run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Fetches in flight at once across the whole run
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Cells per store write
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub mode: IngestionMode,
    /// Region to refresh; the whole globe when absent
    #[serde(default)]
    pub region: Option<RegionConfig>,
}

/// Where a route request reads its costs from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostSourceKind {
    /// The ingested grid store
    #[default]
    Cache,
    /// Fresh observations for every window
    Live,
}

/// Route search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_initial_buffer")]
    pub initial_lat_buffer: u32,
    #[serde(default = "default_initial_buffer")]
    pub initial_lon_buffer: u32,
    /// Cap on each buffer, in degrees
    #[serde(default = "default_max_buffer")]
    pub max_buffer: u32,
    #[serde(default)]
    pub heuristic: Heuristic,
    #[serde(default)]
    pub cost_source: CostSourceKind,
    /// Speed used for the travel-time estimate
    #[serde(default = "default_vessel_speed")]
    pub vessel_speed_knots: f64,
}

/// Land mask source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LandConfig {
    /// JSON list of `[lat, lon]` land cells; open sea everywhere when absent
    pub mask_path: Option<String>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// OTLP/HTTP collector endpoint; span export is off when absent
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

// Default value functions
fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5/weather".to_string()
}

fn default_weather_timeout() -> u32 {
    30
}

fn default_cache_location() -> String {
    "~/.cache/aquaroute/grid".to_string()
}

fn default_concurrency_limit() -> usize {
    50
}

fn default_batch_size() -> usize {
    5000
}

fn default_initial_buffer() -> u32 {
    1
}

fn default_max_buffer() -> u32 {
    8
}

fn default_vessel_speed() -> f64 {
    crate::route::DEFAULT_VESSEL_SPEED_KNOTS
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_base_url(),
            timeout_seconds: default_weather_timeout(),
            max_retries: 0,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            location: default_cache_location(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            batch_size: default_batch_size(),
            mode: IngestionMode::default(),
            region: None,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            initial_lat_buffer: default_initial_buffer(),
            initial_lon_buffer: default_initial_buffer(),
            max_buffer: default_max_buffer(),
            heuristic: Heuristic::default(),
            cost_source: CostSourceKind::default(),
            vessel_speed_knots: default_vessel_speed(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            otlp_endpoint: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // AQUAROUTE_ROUTING__MAX_BUFFER=12 overrides routing.max_buffer
        builder = builder.add_source(
            Environment::with_prefix("AQUAROUTE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("aquaroute").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.weather.base_url.is_empty() {
            self.weather.base_url = default_weather_base_url();
        }
        if self.weather.timeout_seconds == 0 {
            self.weather.timeout_seconds = default_weather_timeout();
        }
        if self.cache.location.is_empty() {
            self.cache.location = default_cache_location();
        }
        if self.ingestion.concurrency_limit == 0 {
            self.ingestion.concurrency_limit = default_concurrency_limit();
        }
        if self.ingestion.batch_size == 0 {
            self.ingestion.batch_size = default_batch_size();
        }
        if self.routing.vessel_speed_knots <= 0.0 {
            self.routing.vessel_speed_knots = default_vessel_speed();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_api_keys()?;
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate API keys and credentials
    pub fn validate_api_keys(&self) -> Result<()> {
        if let Some(api_key) = &self.weather.api_key
            && api_key.trim().is_empty()
        {
            return Err(RouteError::config(
                "Weather API key cannot be empty if provided. Either remove it or provide a valid key.",
            )
            .into());
        }
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.weather.timeout_seconds > 300 {
            return Err(RouteError::config("Weather API timeout cannot exceed 300 seconds").into());
        }

        if self.weather.max_retries > 10 {
            return Err(RouteError::config("Weather API max retries cannot exceed 10").into());
        }

        if self.ingestion.concurrency_limit > MAX_CONCURRENCY_LIMIT {
            return Err(RouteError::config(format!(
                "Ingestion concurrency_limit cannot exceed {MAX_CONCURRENCY_LIMIT}"
            ))
            .into());
        }

        let routing = &self.routing;
        if routing.max_buffer == 0 {
            return Err(RouteError::config("Routing max_buffer must be at least 1").into());
        }
        if routing.initial_lat_buffer > routing.max_buffer
            || routing.initial_lon_buffer > routing.max_buffer
        {
            return Err(RouteError::config(format!(
                "Initial buffers ({}, {}) cannot exceed max_buffer {}",
                routing.initial_lat_buffer, routing.initial_lon_buffer, routing.max_buffer
            ))
            .into());
        }

        if !(self.cost.floor > 0.0) {
            return Err(RouteError::config("Cost floor must be strictly positive").into());
        }

        if let Some(region) = &self.ingestion.region {
            GridIndexer::default()
                .bbox(region.lat_min, region.lon_min, region.lat_max, region.lon_max)
                .map_err(|e| RouteError::config(format!("Invalid ingestion region: {e}")))?;
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(RouteError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(RouteError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        if !self.weather.base_url.starts_with("http://")
            && !self.weather.base_url.starts_with("https://")
        {
            return Err(
                RouteError::config("Weather API base URL must be a valid HTTP or HTTPS URL").into(),
            );
        }

        Ok(())
    }

    /// Store directory with a leading `~` expanded
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        match self.cache.location.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.cache.location)),
            None => PathBuf::from(&self.cache.location),
        }
    }

    /// Configured ingestion region, or the whole globe
    pub fn ingestion_region(&self, indexer: &GridIndexer) -> crate::Result<BoundingBox> {
        match &self.ingestion.region {
            Some(r) => indexer.bbox(r.lat_min, r.lon_min, r.lat_max, r.lon_max),
            None => Ok(BoundingBox::GLOBAL),
        }
    }

    #[must_use]
    pub fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            concurrency_limit: self.ingestion.concurrency_limit,
            batch_size: self.ingestion.batch_size,
            fetch_timeout: self.fetch_timeout(),
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_lat_buffer: self.routing.initial_lat_buffer,
            initial_lon_buffer: self.routing.initial_lon_buffer,
            max_buffer: self.routing.max_buffer,
        }
    }

    /// Per-fetch timeout applied by the pipeline and the live cost source
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.weather.timeout_seconds.into())
    }
}
