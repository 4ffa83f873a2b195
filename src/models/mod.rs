//! Data models for turbcast
//!
//! This module contains the core domain models organized by concern:
//! - Location: Geographic coordinates and validation
//! - Route: Waypoints and the flown route with its altitude profile
//! - Forecast: Turbulence samples, per-segment forecasts and quality metadata

pub mod forecast;
pub mod location;
pub mod route;

// Re-export all public types for convenient access
pub use forecast::{
    DataQuality, ForecastMetadata, ModelProvenance, RouteForecast, SegmentForecast,
    TurbulenceLevel, TurbulenceSample,
};
pub use location::Coordinate;
pub use route::{Route, Waypoint};
