//! Turbulence forecast models and classification rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Route, Waypoint};

/// EDR below this is smooth
pub const LIGHT_THRESHOLD: f64 = 0.15;
/// EDR below this is light
pub const MODERATE_THRESHOLD: f64 = 0.25;
/// EDR below this is moderate, anything above is severe
pub const SEVERE_THRESHOLD: f64 = 0.40;

/// Turbulence intensity category
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum TurbulenceLevel {
    Smooth,
    Light,
    Moderate,
    Severe,
}

impl TurbulenceLevel {
    /// Classify an EDR value using the fixed thresholds
    #[must_use]
    pub fn from_edr(edr: f64) -> Self {
        if edr < LIGHT_THRESHOLD {
            TurbulenceLevel::Smooth
        } else if edr < MODERATE_THRESHOLD {
            TurbulenceLevel::Light
        } else if edr < SEVERE_THRESHOLD {
            TurbulenceLevel::Moderate
        } else {
            TurbulenceLevel::Severe
        }
    }
}

/// Turbulence and wind estimate at one waypoint
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TurbulenceSample {
    /// Eddy dissipation rate, [0, 1]
    pub edr: f64,
    pub level: TurbulenceLevel,
    /// Wind speed in knots
    pub wind_speed_kt: f64,
    /// Direction the wind blows from, [0, 360)
    pub wind_direction_deg: f64,
}

impl TurbulenceSample {
    /// Build a sample, clamping EDR into [0, 1] and deriving the level from it
    #[must_use]
    pub fn new(edr: f64, wind_speed_kt: f64, wind_direction_deg: f64) -> Self {
        let edr = if edr.is_finite() { edr.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            edr,
            level: TurbulenceLevel::from_edr(edr),
            wind_speed_kt: wind_speed_kt.max(0.0),
            wind_direction_deg: wind_direction_deg.rem_euclid(360.0),
        }
    }
}

/// Forecast for one route segment
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SegmentForecast {
    pub waypoint: Waypoint,
    pub turbulence: TurbulenceSample,
}

/// Aggregate confidence in a forecast
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Low,
    Medium,
    High,
}

impl DataQuality {
    /// Quality from the number of relevant reports of each kind
    #[must_use]
    pub fn from_counts(pirep_count: u32, sigmet_count: u32, airmet_count: u32) -> Self {
        if pirep_count >= 3 || sigmet_count >= 2 || airmet_count >= 2 {
            DataQuality::High
        } else if pirep_count >= 1 || sigmet_count >= 1 || airmet_count >= 1 {
            DataQuality::Medium
        } else {
            DataQuality::Low
        }
    }
}

/// Which model run produced the raster values
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelProvenance {
    pub source: String,
    /// Run identifier, `YYYYMMDD/HHz`
    pub run_id: String,
    pub forecast_hour: u32,
    pub pressure_level_hpa: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ForecastMetadata {
    pub pirep_count: u32,
    pub sigmet_count: u32,
    pub airmet_count: u32,
    pub data_quality: DataQuality,
    pub last_updated: DateTime<Utc>,
    /// Neither raster nor reports were available
    pub using_fallback: bool,
    /// A report or advisory feed failed and the others returned nothing relevant,
    /// so the values rest on the model (or heuristic) alone
    pub model_only: bool,
    pub model: Option<ModelProvenance>,
}

/// Complete forecast for a route, the unit that gets cached
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RouteForecast {
    pub route: Route,
    pub segments: Vec<SegmentForecast>,
    pub metadata: ForecastMetadata,
}

impl RouteForecast {
    /// Worst level encountered along the route
    #[must_use]
    pub fn worst_level(&self) -> TurbulenceLevel {
        self.segments
            .iter()
            .map(|s| s.turbulence.level)
            .max()
            .unwrap_or(TurbulenceLevel::Smooth)
    }
}
