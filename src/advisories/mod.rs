//! Pilot reports, SIGMETs and AIRMETs along a route
//!
//! The three feeds share one record shape. [`AdvisoryMatcher`] queries them
//! for the route bounding box, keeps the turbulence-relevant entries and turns
//! them into EDR floors.

pub mod feed;
pub mod matcher;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::Result;
use crate::models::Waypoint;

pub use feed::HttpAdvisoryFeed;
pub use matcher::{AdvisoryMatcher, HazardReports, PilotReport};

/// Which feed a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvisoryKind {
    Pirep,
    Sigmet,
    Airmet,
}

impl AdvisoryKind {
    /// Data API endpoint serving this kind
    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        match self {
            AdvisoryKind::Pirep => "pirep",
            AdvisoryKind::Sigmet => "isigmet",
            AdvisoryKind::Airmet => "airsigmet",
        }
    }
}

impl fmt::Display for AdvisoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Record shape shared by point reports and area advisories
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryRecord {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub hazard: Option<String>,
    #[serde(default, alias = "qualifier", deserialize_with = "string_or_number")]
    pub severity: Option<String>,
    #[serde(default, alias = "rawOb", alias = "rawSigmet", alias = "rawAirSigmet")]
    pub raw_text: Option<String>,
    /// Free-text turbulence intensity, e.g. `MOD` or `LGT-MOD`
    #[serde(default, alias = "tbInt1")]
    pub turbulence_intensity: Option<String>,
    #[serde(default, alias = "obsTime", alias = "validTimeFrom", deserialize_with = "string_or_number")]
    pub timestamp: Option<String>,
}

/// Feeds are inconsistent about quoting numbers
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Turbulence intensity category parsed from free text
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Intensity {
    Light,
    Moderate,
    Severe,
}

impl Intensity {
    /// Severe or extreme wins over moderate, which wins over light
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        if text.contains("sev") || text.contains("extm") || text.contains("extreme") {
            Some(Intensity::Severe)
        } else if text.contains("mod") {
            Some(Intensity::Moderate)
        } else if text.contains("lgt") || text.contains("light") {
            Some(Intensity::Light)
        } else {
            None
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Intensity::Light => "light",
            Intensity::Moderate => "moderate",
            Intensity::Severe => "severe",
        };
        f.write_str(label)
    }
}

/// Query box in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Extent of the waypoints padded by `padding_deg`, clamped to valid ranges
    #[must_use]
    pub fn around(waypoints: &[Waypoint], padding_deg: f64) -> Option<Self> {
        let first = waypoints.first()?;
        let init = Self {
            min_lat: first.latitude,
            min_lon: first.longitude,
            max_lat: first.latitude,
            max_lon: first.longitude,
        };
        let bbox = waypoints.iter().fold(init, |b, w| Self {
            min_lat: b.min_lat.min(w.latitude),
            min_lon: b.min_lon.min(w.longitude),
            max_lat: b.max_lat.max(w.latitude),
            max_lon: b.max_lon.max(w.longitude),
        });

        Some(Self {
            min_lat: (bbox.min_lat - padding_deg).max(-90.0),
            min_lon: (bbox.min_lon - padding_deg).max(-180.0),
            max_lat: (bbox.max_lat + padding_deg).min(90.0),
            max_lon: (bbox.max_lon + padding_deg).min(180.0),
        })
    }

    /// `minLat,minLon,maxLat,maxLon`
    #[must_use]
    pub fn query_value(&self) -> String {
        format!(
            "{:.2},{:.2},{:.2},{:.2}",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }
}

/// Source of advisory and report records
#[async_trait]
pub trait AdvisoryFeed: Send + Sync {
    async fn fetch(&self, kind: AdvisoryKind, bbox: &BoundingBox) -> Result<Vec<AdvisoryRecord>>;
}
