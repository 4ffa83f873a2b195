//! Coordinate model and great-circle helpers

use haversine::{Location as HaversineLocation, Units, distance};
use serde::{Deserialize, Serialize};

use crate::{Result, TurbcastError};

/// Kilometres per nautical mile
pub const KM_PER_NM: f64 = 1.852;

/// Geographic coordinate in decimal degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Latitude in decimal degrees, [-90, 90]
    pub latitude: f64,
    /// Longitude in decimal degrees, (-180, 180]
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate without validation
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Create a coordinate, rejecting non-finite or out-of-range values.
    /// A longitude of exactly -180 is folded onto 180.
    pub fn validated(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(TurbcastError::invalid_input(format!(
                "latitude {latitude} is outside [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(TurbcastError::invalid_input(format!(
                "longitude {longitude} is outside (-180, 180]"
            )));
        }
        let longitude = if longitude == -180.0 { 180.0 } else { longitude };
        Ok(Self::new(latitude, longitude))
    }

    /// Re-run validation on an already constructed coordinate
    pub fn validate(&self) -> Result<Self> {
        Self::validated(self.latitude, self.longitude)
    }

    /// Great-circle distance in kilometres
    #[must_use]
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        distance(
            HaversineLocation {
                latitude: self.latitude,
                longitude: self.longitude,
            },
            HaversineLocation {
                latitude: other.latitude,
                longitude: other.longitude,
            },
            Units::Kilometers,
        )
    }

    /// Great-circle distance in nautical miles
    #[must_use]
    pub fn distance_nm(&self, other: &Coordinate) -> f64 {
        self.distance_km(other) / KM_PER_NM
    }

    /// Round coordinates for cache key generation
    #[must_use]
    pub fn rounded_coordinates(&self, precision: u32) -> (f64, f64) {
        let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
        let lat = (self.latitude * multiplier).round() / multiplier;
        let lon = (self.longitude * multiplier).round() / multiplier;
        (lat, lon)
    }

    /// Stable key fragment, three decimals (~100 m)
    #[must_use]
    pub fn key_fragment(&self) -> String {
        let (lat, lon) = self.rounded_coordinates(3);
        format!("{lat:.3},{lon:.3}")
    }
}
