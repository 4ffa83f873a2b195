//! turbcast - turbulence forecasts along great-circle flight routes
//!
//! Combines gridded WAFS turbulence and wind rasters, SIGMETs, AIRMETs and
//! pilot reports into a per-waypoint forecast with a data quality rating.

pub mod advisories;
pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod forecast;
pub mod fusion;
pub mod heuristic;
pub mod location_resolver;
pub mod logging;
pub mod models;
pub mod raster;
pub mod routing;
pub mod web;

// Re-export core types for public API
pub use config::TurbcastConfig;
pub use error::TurbcastError;
pub use forecast::{ForecastRequest, TurbulenceForecastService};
pub use models::{Coordinate, RouteForecast, TurbulenceLevel};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, TurbcastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
