//! Configuration management for turbcast
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::TurbcastError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurbcastConfig {
    /// Gridded model raster source
    #[serde(default)]
    pub raster: RasterConfig,
    /// SIGMET / AIRMET / PIREP feeds
    #[serde(default)]
    pub advisories: AdvisoryConfig,
    /// Forecast cache
    #[serde(default)]
    pub cache: CacheConfig,
    /// Route construction
    #[serde(default)]
    pub route: RouteConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,
}

/// Raster model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterConfig {
    /// Base URL raster addresses are built from
    #[serde(default = "default_raster_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_raster_timeout")]
    pub timeout_seconds: u32,
    /// How long decoded images and resolved runs stay cached
    #[serde(default = "default_raster_cache_ttl")]
    pub cache_ttl_minutes: u32,
    /// Runs tried before giving up (current cycle plus step-backs)
    #[serde(default = "default_max_run_attempts")]
    pub max_run_attempts: u32,
    /// Longest forecast hour the model publishes
    #[serde(default = "default_max_forecast_hour")]
    pub max_forecast_hour: u32,
    /// Pressure level the rasters are rendered for
    #[serde(default = "default_pressure_level")]
    pub pressure_level_hpa: u32,
}

/// Advisory feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryConfig {
    /// Base URL of the aviation weather data API
    #[serde(default = "default_advisory_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_advisory_timeout")]
    pub timeout_seconds: u32,
    /// Degrees added around the route bounding box
    #[serde(default = "default_bbox_padding")]
    pub bbox_padding_deg: f64,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Forecast TTL in minutes
    #[serde(default = "default_cache_ttl")]
    pub ttl_minutes: u32,
    /// Cache directory location; empty keeps forecasts in memory
    #[serde(default = "default_cache_location")]
    pub location: String,
}

/// Route construction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Distance between waypoints in km
    #[serde(default = "default_waypoint_spacing")]
    pub waypoint_spacing_km: f64,
    /// Upper bound for the whole pipeline in seconds
    #[serde(default = "default_pipeline_timeout")]
    pub pipeline_timeout_seconds: u32,
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
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u32,
}

// Default value functions
fn default_raster_base_url() -> String {
    "https://aviationweather.gov/data/products/wafs".to_string()
}

fn default_raster_timeout() -> u32 {
    15
}

fn default_raster_cache_ttl() -> u32 {
    20
}

fn default_max_run_attempts() -> u32 {
    4
}

fn default_max_forecast_hour() -> u32 {
    36
}

fn default_pressure_level() -> u32 {
    250
}

fn default_advisory_base_url() -> String {
    "https://aviationweather.gov/api/data".to_string()
}

fn default_advisory_timeout() -> u32 {
    10
}

fn default_bbox_padding() -> f64 {
    2.0
}

fn default_cache_ttl() -> u32 {
    30
}

fn default_cache_location() -> String {
    dirs::cache_dir()
        .map(|dir| dir.join("turbcast").to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn default_waypoint_spacing() -> f64 {
    50.0
}

fn default_pipeline_timeout() -> u32 {
    25
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u32 {
    30
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            base_url: default_raster_base_url(),
            timeout_seconds: default_raster_timeout(),
            cache_ttl_minutes: default_raster_cache_ttl(),
            max_run_attempts: default_max_run_attempts(),
            max_forecast_hour: default_max_forecast_hour(),
            pressure_level_hpa: default_pressure_level(),
        }
    }
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_advisory_base_url(),
            timeout_seconds: default_advisory_timeout(),
            bbox_padding_deg: default_bbox_padding(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_cache_ttl(),
            location: default_cache_location(),
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            waypoint_spacing_km: default_waypoint_spacing(),
            pipeline_timeout_seconds: default_pipeline_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for TurbcastConfig {
    fn default() -> Self {
        Self {
            raster: RasterConfig::default(),
            advisories: AdvisoryConfig::default(),
            cache: CacheConfig::default(),
            route: RouteConfig::default(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl TurbcastConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

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

        // TURBCAST_RASTER__BASE_URL etc.
        builder = builder.add_source(
            Environment::with_prefix("TURBCAST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: TurbcastConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("turbcast").join("config.toml"))
    }

    /// Apply default values to zeroed or empty fields
    pub fn apply_defaults(&mut self) {
        if self.raster.base_url.is_empty() {
            self.raster.base_url = default_raster_base_url();
        }
        if self.raster.timeout_seconds == 0 {
            self.raster.timeout_seconds = default_raster_timeout();
        }
        if self.raster.cache_ttl_minutes == 0 {
            self.raster.cache_ttl_minutes = default_raster_cache_ttl();
        }
        if self.raster.max_run_attempts == 0 {
            self.raster.max_run_attempts = default_max_run_attempts();
        }
        if self.raster.pressure_level_hpa == 0 {
            self.raster.pressure_level_hpa = default_pressure_level();
        }
        if self.advisories.base_url.is_empty() {
            self.advisories.base_url = default_advisory_base_url();
        }
        if self.advisories.timeout_seconds == 0 {
            self.advisories.timeout_seconds = default_advisory_timeout();
        }
        if self.cache.ttl_minutes == 0 {
            self.cache.ttl_minutes = default_cache_ttl();
        }
        if self.route.waypoint_spacing_km <= 0.0 {
            self.route.waypoint_spacing_km = default_waypoint_spacing();
        }
        if self.route.pipeline_timeout_seconds == 0 {
            self.route.pipeline_timeout_seconds = default_pipeline_timeout();
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
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.raster.timeout_seconds > 120 || self.advisories.timeout_seconds > 120 {
            return Err(TurbcastError::config("Upstream timeout cannot exceed 120 seconds").into());
        }

        if self.raster.max_run_attempts > 8 {
            return Err(TurbcastError::config("Raster run attempts cannot exceed 8").into());
        }

        if self.raster.max_forecast_hour > 240 {
            return Err(TurbcastError::config("Maximum forecast hour cannot exceed 240").into());
        }

        if !(0.0..=10.0).contains(&self.advisories.bbox_padding_deg) {
            return Err(TurbcastError::config(
                "Bounding box padding must be between 0 and 10 degrees",
            )
            .into());
        }

        if self.cache.ttl_minutes > 24 * 60 {
            return Err(TurbcastError::config("Cache TTL cannot exceed 24 hours").into());
        }

        if !self.route.waypoint_spacing_km.is_finite() || self.route.waypoint_spacing_km > 1000.0 {
            return Err(TurbcastError::config("Waypoint spacing cannot exceed 1000 km").into());
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(TurbcastError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(TurbcastError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Raster", &self.raster.base_url),
            ("Advisory", &self.advisories.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(TurbcastError::config(format!(
                    "{name} base URL must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}
